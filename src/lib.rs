//! mq_descriptor - handoff descriptors for zero-copy shared memory queues
//!
//! A producer describes a queue as a list of grants (read counter, write
//! counter, data ring and an optional wake word) over one or more shared
//! memory regions. The resulting [`QueueDescriptor`] can be passed to an
//! unrelated process, which maps the same memory from it without any other
//! knowledge of the producer's layout.
//!
//! # Ownership
//!
//! Descriptors are move-only. [`QueueDescriptor::duplicate`] is the only way
//! to obtain a second live descriptor; it duplicates every region handle so
//! each copy closes its own, and dropping one never invalidates another.
//!
//! # Flavors
//!
//! - **Strict**: one writer, one reader; overflow and underflow fail
//! - **RelaxedWrite**: one writer, many readers; writes overwrite unread data

pub mod error;
pub mod grant;
pub mod flavor;
pub mod layout;
pub mod config;
pub mod region;
pub mod handle;
pub mod mapping;
pub mod descriptor;
pub mod bindings;

pub use config::QueueConfig;
pub use descriptor::{
    AnyDescriptor, QueueDescriptor, RelaxedDescriptor, StrictDescriptor, OFFSET_OF_GRANTS,
    OFFSET_OF_HANDLE,
};
pub use error::{DescriptorError, Result};
pub use flavor::{Flavor, QueueFlavor, RelaxedWrite, Strict};
pub use grant::{Grant, GrantRole, RingPosition};
pub use handle::{HandleView, OpaqueHandle};
pub use layout::{compute_default_layout, try_compute_default_layout, DefaultLayout};
pub use mapping::{GrantMapping, MappedQueue};
