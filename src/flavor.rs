//! Queue flavors
//!
//! The descriptor only records which discipline applies; the queue engine
//! that maps it enforces the discipline.
//!
//! - **Strict**: one writer, one reader. Overflow and underflow fail.
//! - **RelaxedWrite**: one writer, many readers. Writes always succeed and
//!   overwrite unread data; a reader that has been lapped must notice it by
//!   comparing against the write counter and resynchronize.

use crate::error::{DescriptorError, Result};

/// Run-time flavor discriminant, stored in the descriptor's `flags`
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Strict = 0x01,
    RelaxedWrite = 0x02,
}

impl Flavor {
    /// Flag bits written into a descriptor
    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode a received flag word
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0x01 => Ok(Flavor::Strict),
            0x02 => Ok(Flavor::RelaxedWrite),
            other => Err(DescriptorError::UnknownFlavor(other)),
        }
    }

    /// Whether a full ring is overwritten instead of rejecting the write
    #[inline]
    pub const fn overwrites_on_overflow(self) -> bool {
        matches!(self, Flavor::RelaxedWrite)
    }

    /// Whether more than one reader may attach
    #[inline]
    pub const fn allows_multiple_readers(self) -> bool {
        matches!(self, Flavor::RelaxedWrite)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time flavor marker for [`QueueDescriptor`](crate::QueueDescriptor)
pub trait QueueFlavor: sealed::Sealed + 'static {
    const FLAVOR: Flavor;
}

/// Single writer, single reader; overflow and underflow are errors
#[derive(Debug)]
pub enum Strict {}

/// Single writer, many readers; writes overwrite unread data
#[derive(Debug)]
pub enum RelaxedWrite {}

impl sealed::Sealed for Strict {}
impl sealed::Sealed for RelaxedWrite {}

impl QueueFlavor for Strict {
    const FLAVOR: Flavor = Flavor::Strict;
}

impl QueueFlavor for RelaxedWrite {
    const FLAVOR: Flavor = Flavor::RelaxedWrite;
}
