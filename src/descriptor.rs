//! The transferable queue descriptor
//!
//! A [`QueueDescriptor`] is what a producer hands to a consumer in another
//! process: the grant list, the handle owning the backing regions, the
//! element size and the flavor flags. The receiver rebuilds the producer's
//! mappings from it without knowing anything else about the queue.
//!
//! # Binary layout
//!
//! The struct is `#[repr(C)]` and publishes [`OFFSET_OF_GRANTS`] and
//! [`OFFSET_OF_HANDLE`] so transport code can patch those fields in a
//! flattened buffer by offset alone. `quantum` and `flags` are 4-byte
//! unsigned fields.

use crate::config::QueueConfig;
use crate::error::{DescriptorError, Result};
use crate::flavor::{Flavor, QueueFlavor, RelaxedWrite, Strict};
use crate::grant::{
    Grant, GrantRole, MIN_GRANT_COUNT, MIN_GRANT_COUNT_WITH_WAKE_WORD, RING_POSITION_SIZE,
};
use crate::handle::{HandleView, OpaqueHandle};
use crate::layout::try_compute_default_layout;
use crate::mapping::MappedQueue;
use crate::region::create_region;
use std::fmt;
use std::marker::PhantomData;
use std::mem::offset_of;

/// Byte offset of the grant list inside a descriptor
pub const OFFSET_OF_GRANTS: usize = offset_of!(QueueDescriptor<Strict>, grants);

/// Byte offset of the handle inside a descriptor
pub const OFFSET_OF_HANDLE: usize = offset_of!(QueueDescriptor<Strict>, handle);

// The flavor marker is zero-sized, so both flavors share one layout.
const _: () = assert!(OFFSET_OF_GRANTS == offset_of!(QueueDescriptor<RelaxedWrite>, grants));
const _: () = assert!(OFFSET_OF_HANDLE == offset_of!(QueueDescriptor<RelaxedWrite>, handle));

/// Descriptor for a single-writer, single-reader queue
pub type StrictDescriptor = QueueDescriptor<Strict>;

/// Descriptor for a single-writer, multi-reader queue
pub type RelaxedDescriptor = QueueDescriptor<RelaxedWrite>;

/// Everything a consumer needs to map a shared memory queue
///
/// Move-only: a second live descriptor can only come from
/// [`duplicate`](Self::duplicate), which gives it its own region handles.
#[repr(C)]
pub struct QueueDescriptor<F: QueueFlavor> {
    grants: Vec<Grant>,
    handle: Option<OpaqueHandle>,
    quantum: u32,
    flags: u32,
    _flavor: PhantomData<fn() -> F>,
}

impl<F: QueueFlavor> QueueDescriptor<F> {
    pub const OFFSET_OF_GRANTS: usize = OFFSET_OF_GRANTS;
    pub const OFFSET_OF_HANDLE: usize = OFFSET_OF_HANDLE;

    /// Build from an explicit grant list, taking ownership of `handle`
    ///
    /// Grants are stored in the given order.
    pub fn new(grants: Vec<Grant>, handle: Option<OpaqueHandle>, quantum: u32) -> Result<Self> {
        validate(&grants, handle.as_ref(), quantum)?;
        Ok(Self {
            grants,
            handle,
            quantum,
            flags: F::FLAVOR.bits(),
            _flavor: PhantomData,
        })
    }

    /// Build with the default packed layout for a ring of `buffer_size` bytes
    pub fn with_default_layout(
        buffer_size: usize,
        handle: Option<OpaqueHandle>,
        message_size: u32,
        wake_word: bool,
    ) -> Result<Self> {
        let layout = try_compute_default_layout(buffer_size, message_size, wake_word)?;
        Self::new(layout.grants, handle, layout.quantum)
    }

    /// Build from fields received over a transport
    ///
    /// Unlike [`new`](Self::new), the flag word comes from the sender and
    /// must match this descriptor's flavor.
    pub fn from_received(
        grants: Vec<Grant>,
        handle: Option<OpaqueHandle>,
        quantum: u32,
        flags: u32,
    ) -> Result<Self> {
        let expected = F::FLAVOR.bits();
        if flags != expected {
            Flavor::from_bits(flags)?;
            return Err(DescriptorError::FlavorMismatch {
                expected,
                got: flags,
            });
        }
        Self::new(grants, handle, quantum)
    }

    /// Create a backing region for `config` and describe it
    pub fn allocate(config: &QueueConfig) -> Result<Self> {
        let layout =
            try_compute_default_layout(config.buffer_size, config.message_size, config.wake_word)?;
        validate(&layout.grants, None, layout.quantum)?;

        let fd = create_region(&config.region_name, layout.total_size())?;
        Self::new(layout.grants, Some(OpaqueHandle::from_fd(fd)), layout.quantum)
    }

    /// Second live descriptor with its own duplicated region handles
    pub fn duplicate(&self) -> Result<Self> {
        let handle = match &self.handle {
            Some(h) => Some(h.duplicate()?),
            None => None,
        };
        Ok(Self {
            grants: self.grants.clone(),
            handle,
            quantum: self.quantum,
            flags: self.flags,
            _flavor: PhantomData,
        })
    }

    /// Size of the data ring in bytes
    pub fn size(&self) -> Result<usize> {
        self.grant(GrantRole::DataBuffer).map(|g| g.extent)
    }

    /// Number of elements the ring holds
    pub fn capacity(&self) -> Result<usize> {
        Ok(self.size()? / self.quantum as usize)
    }

    /// Size of one element in bytes
    #[inline(always)]
    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    /// Flavor flag word
    #[inline(always)]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Discipline the queue engine must enforce
    #[inline(always)]
    pub fn flavor(&self) -> Flavor {
        F::FLAVOR
    }

    #[inline]
    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    /// Grants in role order
    #[inline]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Grant at `index`
    pub fn grant_at(&self, index: usize) -> Result<&Grant> {
        self.grants.get(index).ok_or(DescriptorError::IndexOutOfRange {
            index,
            len: self.grants.len(),
        })
    }

    /// Grant playing `role`
    #[inline]
    pub fn grant(&self, role: GrantRole) -> Result<&Grant> {
        self.grant_at(role.index())
    }

    /// Whether a wake word grant is present
    #[inline]
    pub fn has_wake_word(&self) -> bool {
        self.grants.len() >= MIN_GRANT_COUNT_WITH_WAKE_WORD
    }

    /// Whether a region handle is attached; false for placeholders
    #[inline]
    pub fn is_handle_valid(&self) -> bool {
        self.handle.is_some()
    }

    /// Borrowed view of the handle; ownership stays with the descriptor
    #[inline]
    pub fn native_handle(&self) -> Option<HandleView<'_>> {
        self.handle.as_ref().map(OpaqueHandle::view)
    }

    /// Map every grant into this address space
    pub fn map(&self) -> Result<MappedQueue> {
        let handle = self.native_handle().ok_or(DescriptorError::MissingHandle)?;
        MappedQueue::new(handle, &self.grants, self.quantum, F::FLAVOR)
    }
}

/// Placeholder with no grants, no handle and a zero quantum
impl<F: QueueFlavor> Default for QueueDescriptor<F> {
    fn default() -> Self {
        Self {
            grants: Vec::new(),
            handle: None,
            quantum: 0,
            flags: F::FLAVOR.bits(),
            _flavor: PhantomData,
        }
    }
}

impl<F: QueueFlavor> fmt::Debug for QueueDescriptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDescriptor")
            .field("grants", &self.grants)
            .field("handle", &self.handle)
            .field("quantum", &self.quantum)
            .field("flags", &format_args!("0x{:08X}", self.flags))
            .finish()
    }
}

fn validate(grants: &[Grant], handle: Option<&OpaqueHandle>, quantum: u32) -> Result<()> {
    if grants.len() < MIN_GRANT_COUNT || grants.len() > MIN_GRANT_COUNT_WITH_WAKE_WORD {
        return Err(DescriptorError::layout(format!(
            "{} grants, expected {} or {}",
            grants.len(),
            MIN_GRANT_COUNT,
            MIN_GRANT_COUNT_WITH_WAKE_WORD
        )));
    }

    for role in [GrantRole::ReadCounter, GrantRole::WriteCounter] {
        let extent = grants[role.index()].extent;
        if extent != RING_POSITION_SIZE {
            return Err(DescriptorError::layout(format!(
                "{:?} grant is {} bytes, expected {}",
                role, extent, RING_POSITION_SIZE
            )));
        }
    }

    if quantum == 0 {
        return Err(DescriptorError::layout("quantum must be non-zero"));
    }

    let data = grants[GrantRole::DataBuffer.index()].extent;
    if data % quantum as usize != 0 {
        return Err(DescriptorError::layout(format!(
            "buffer of {} bytes is not a multiple of quantum {}",
            data, quantum
        )));
    }

    for (i, grant) in grants.iter().enumerate() {
        if grant.end().is_none() {
            return Err(DescriptorError::layout(format!(
                "grant {} at offset {} with extent {} overflows",
                i, grant.offset, grant.extent
            )));
        }
    }

    if let Some(handle) = handle {
        for (i, grant) in grants.iter().enumerate() {
            if grant.source_index as usize >= handle.fd_count() {
                return Err(DescriptorError::layout(format!(
                    "grant {} names region {}, handle carries {}",
                    i,
                    grant.source_index,
                    handle.fd_count()
                )));
            }
        }
    }

    Ok(())
}

/// A descriptor whose flavor is only known at run time
#[derive(Debug)]
pub enum AnyDescriptor {
    Strict(StrictDescriptor),
    RelaxedWrite(RelaxedDescriptor),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            AnyDescriptor::Strict($d) => $body,
            AnyDescriptor::RelaxedWrite($d) => $body,
        }
    };
}

impl AnyDescriptor {
    /// Build from received fields, picking the flavor from `flags`
    pub fn from_received(
        grants: Vec<Grant>,
        handle: Option<OpaqueHandle>,
        quantum: u32,
        flags: u32,
    ) -> Result<Self> {
        match Flavor::from_bits(flags)? {
            Flavor::Strict => Ok(Self::Strict(QueueDescriptor::new(grants, handle, quantum)?)),
            Flavor::RelaxedWrite => Ok(Self::RelaxedWrite(QueueDescriptor::new(
                grants, handle, quantum,
            )?)),
        }
    }

    /// Allocate a fresh queue of the given flavor
    pub fn allocate(flavor: Flavor, config: &QueueConfig) -> Result<Self> {
        match flavor {
            Flavor::Strict => QueueDescriptor::allocate(config).map(Self::Strict),
            Flavor::RelaxedWrite => QueueDescriptor::allocate(config).map(Self::RelaxedWrite),
        }
    }

    pub fn duplicate(&self) -> Result<Self> {
        match self {
            Self::Strict(d) => d.duplicate().map(Self::Strict),
            Self::RelaxedWrite(d) => d.duplicate().map(Self::RelaxedWrite),
        }
    }

    pub fn flavor(&self) -> Flavor {
        dispatch!(self, d => d.flavor())
    }

    pub fn flags(&self) -> u32 {
        dispatch!(self, d => d.flags())
    }

    pub fn quantum(&self) -> u32 {
        dispatch!(self, d => d.quantum())
    }

    pub fn size(&self) -> Result<usize> {
        dispatch!(self, d => d.size())
    }

    pub fn grants(&self) -> &[Grant] {
        dispatch!(self, d => d.grants())
    }

    pub fn grant_at(&self, index: usize) -> Result<&Grant> {
        dispatch!(self, d => d.grant_at(index))
    }

    pub fn native_handle(&self) -> Option<HandleView<'_>> {
        dispatch!(self, d => d.native_handle())
    }

    pub fn map(&self) -> Result<MappedQueue> {
        dispatch!(self, d => d.map())
    }
}

impl From<StrictDescriptor> for AnyDescriptor {
    fn from(d: StrictDescriptor) -> Self {
        Self::Strict(d)
    }
}

impl From<RelaxedDescriptor> for AnyDescriptor {
    fn from(d: RelaxedDescriptor) -> Self {
        Self::RelaxedWrite(d)
    }
}
