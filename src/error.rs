//! Error types for queue descriptors

use std::io;
use thiserror::Error;

/// Result type for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Errors that can occur while building, duplicating or mapping a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Duplicating an OS region handle failed
    #[error("Failed to duplicate region handle: {source}")]
    ResourceExhausted {
        #[source]
        source: io::Error,
    },

    /// Grant list or sizes do not describe a usable queue
    #[error("Invalid queue layout: {reason}")]
    InvalidLayout { reason: String },

    /// Grant or region position past the end of its sequence
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Flag word does not name a known flavor
    #[error("Unknown queue flavor flags: 0x{0:08X}")]
    UnknownFlavor(u32),

    /// Received flags belong to a different flavor
    #[error("Flavor mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    FlavorMismatch { expected: u32, got: u32 },

    /// Operation needs a handle but the descriptor carries none
    #[error("Descriptor carries no region handle")]
    MissingHandle,

    /// Region name exceeds the kernel limit
    #[error("Region name too long: max {max} bytes, got {got}")]
    NameTooLong { max: usize, got: usize },

    /// Region name contains an interior NUL byte
    #[error("Invalid region name '{0}'")]
    InvalidName(String),

    /// Failed to create the backing region
    #[error("Failed to create shared memory region '{name}': {source}")]
    RegionCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to size the backing region
    #[error("Failed to set region size: {0}")]
    Truncate(#[source] io::Error),

    /// Failed to query the backing region
    #[error("Failed to stat region: {0}")]
    Stat(#[source] io::Error),

    /// Failed to map memory
    #[error("Failed to map memory: {0}")]
    Mmap(#[source] io::Error),
}

impl DescriptorError {
    pub(crate) fn layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = DescriptorError::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(err.to_string(), "Index 5 out of range for length 3");

        let err = DescriptorError::FlavorMismatch {
            expected: 1,
            got: 2,
        };
        assert_eq!(
            err.to_string(),
            "Flavor mismatch: expected 0x00000001, got 0x00000002"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error as _;

        let err = DescriptorError::ResourceExhausted {
            source: io::Error::from_raw_os_error(24),
        };
        assert!(err.source().is_some());
    }
}
