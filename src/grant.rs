//! Grants: the per-region records a descriptor is made of
//!
//! A grant names one sub-range of one backing region. Its role is its
//! position in the descriptor's grant list, never a tag stored in the grant.

use std::mem::size_of;
use std::sync::atomic::AtomicU32;

/// Counter type used for read and write progress
pub type RingPosition = u64;

/// Bytes occupied by a read or write counter
pub const RING_POSITION_SIZE: usize = size_of::<RingPosition>();

/// Bytes occupied by the wake word
pub const WAKE_WORD_SIZE: usize = size_of::<AtomicU32>();

/// Published grant positions
pub const READPTRPOS: usize = GrantRole::ReadCounter as usize;
pub const WRITEPTRPOS: usize = GrantRole::WriteCounter as usize;
pub const DATAPTRPOS: usize = GrantRole::DataBuffer as usize;
pub const EVFLAGWORDPOS: usize = GrantRole::WakeWord as usize;

/// Grants needed for the counters and the data buffer
pub const MIN_GRANT_COUNT: usize = DATAPTRPOS + 1;

/// Grants needed when blocking operations use a wake word
pub const MIN_GRANT_COUNT_WITH_WAKE_WORD: usize = EVFLAGWORDPOS + 1;

/// Role of a grant, given by its position in the grant list
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantRole {
    ReadCounter = 0,
    WriteCounter = 1,
    DataBuffer = 2,
    WakeWord = 3,
}

impl GrantRole {
    /// All roles in encoding order
    pub const ALL: [GrantRole; 4] = [
        GrantRole::ReadCounter,
        GrantRole::WriteCounter,
        GrantRole::DataBuffer,
        GrantRole::WakeWord,
    ];

    /// Position of this role in a grant list
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Role stored at `index`, if any
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// One shared memory sub-region
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Grant {
    /// Grant flags, currently always zero
    pub flags: u32,
    /// Which region of the handle the bytes live in
    pub source_index: u32,
    /// Byte offset inside that region
    pub offset: u32,
    /// Length in bytes
    pub extent: usize,
}

impl Grant {
    pub const fn new(flags: u32, source_index: u32, offset: u32, extent: usize) -> Self {
        Self {
            flags,
            source_index,
            offset,
            extent,
        }
    }

    /// One past the last byte covered by this grant, `None` on overflow
    #[inline]
    pub fn end(&self) -> Option<usize> {
        (self.offset as usize).checked_add(self.extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_positions() {
        assert_eq!(READPTRPOS, 0);
        assert_eq!(WRITEPTRPOS, 1);
        assert_eq!(DATAPTRPOS, 2);
        assert_eq!(EVFLAGWORDPOS, 3);
        assert_eq!(MIN_GRANT_COUNT, 3);
        assert_eq!(MIN_GRANT_COUNT_WITH_WAKE_WORD, 4);
    }

    #[test]
    fn test_canonical_sizes() {
        assert_eq!(RING_POSITION_SIZE, 8);
        assert_eq!(WAKE_WORD_SIZE, 4);
    }

    #[test]
    fn test_role_index_roundtrip() {
        for (i, role) in GrantRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
            assert_eq!(GrantRole::from_index(i), Some(*role));
        }
        assert_eq!(GrantRole::from_index(4), None);
    }

    #[test]
    fn test_grant_end() {
        let grant = Grant::new(0, 0, 16, 64);
        assert_eq!(grant.end(), Some(80));
    }

    #[test]
    fn test_grant_end_overflow() {
        let grant = Grant::new(0, 0, 16, usize::MAX);
        assert_eq!(grant.end(), None);
    }
}
