//! Receiver-side mapping of a descriptor's grants
//!
//! Each grant is mapped on its own: the grant offset is rounded down to a
//! page boundary for `mmap` and the remainder is added back to the pointer.
//! A mapping stays valid after the descriptor (and its handle) is dropped.

use crate::error::{DescriptorError, Result};
use crate::flavor::Flavor;
use crate::grant::{Grant, GrantRole, RingPosition, RING_POSITION_SIZE, WAKE_WORD_SIZE};
use crate::handle::HandleView;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::param::page_size;
use std::io;
use std::mem::align_of;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// One grant mapped into this address space
pub struct GrantMapping {
    base: NonNull<u8>,
    map_len: usize,
    delta: usize,
    extent: usize,
}

// SAFETY: the mapping is plain shared memory; access is coordinated through
// the atomics the queue engine places in it
unsafe impl Send for GrantMapping {}
unsafe impl Sync for GrantMapping {}

impl GrantMapping {
    /// Map `grant` from the region it names in `handle`
    pub fn map(handle: HandleView<'_>, grant: &Grant) -> Result<Self> {
        let index = grant.source_index as usize;
        let fd = handle.fd(index).ok_or(DescriptorError::IndexOutOfRange {
            index,
            len: handle.fd_count(),
        })?;

        if grant.extent == 0 {
            return Err(DescriptorError::layout("cannot map an empty grant"));
        }

        let offset = grant.offset as usize;
        let aligned = offset & !(page_size() - 1);
        let delta = offset - aligned;
        let map_len = delta
            .checked_add(grant.extent)
            .ok_or_else(|| DescriptorError::layout("grant extent overflows"))?;

        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                aligned as u64,
            )
            .map_err(|e| DescriptorError::Mmap(e.into()))?
        };

        let base = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| DescriptorError::Mmap(io::Error::other("mmap returned null")))?;

        log::trace!(
            "mapped grant at region {} offset {} ({} bytes)",
            index,
            offset,
            grant.extent
        );

        Ok(Self {
            base,
            map_len,
            delta,
            extent: grant.extent,
        })
    }

    /// Pointer to the first byte of the grant
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.delta) }
    }

    /// Grant length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.extent
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.extent == 0
    }

    fn as_atomic<T>(&self, size: usize, what: &str) -> Result<*const T> {
        if self.extent < size {
            return Err(DescriptorError::layout(format!(
                "{} grant holds {} bytes, needs {}",
                what, self.extent, size
            )));
        }
        let ptr = self.as_ptr();
        if ptr as usize % align_of::<T>() != 0 {
            return Err(DescriptorError::layout(format!("{} grant is misaligned", what)));
        }
        Ok(ptr as *const T)
    }
}

impl Drop for GrantMapping {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.base.as_ptr().cast(), self.map_len) } {
            log::warn!("failed to unmap grant: {}", e);
        }
    }
}

/// All grants of a descriptor, mapped and ready for a queue engine
pub struct MappedQueue {
    read: GrantMapping,
    write: GrantMapping,
    data: GrantMapping,
    wake: Option<GrantMapping>,
    read_ptr: *const AtomicU64,
    write_ptr: *const AtomicU64,
    wake_ptr: Option<*const AtomicU32>,
    quantum: u32,
    flavor: Flavor,
}

// SAFETY: counters and wake word are only touched through atomics; the data
// buffer is raw memory whose access discipline belongs to the engine
unsafe impl Send for MappedQueue {}
unsafe impl Sync for MappedQueue {}

impl MappedQueue {
    pub(crate) fn new(
        handle: HandleView<'_>,
        grants: &[Grant],
        quantum: u32,
        flavor: Flavor,
    ) -> Result<Self> {
        let grant = |role: GrantRole| {
            grants
                .get(role.index())
                .ok_or(DescriptorError::IndexOutOfRange {
                    index: role.index(),
                    len: grants.len(),
                })
        };

        let read = GrantMapping::map(handle, grant(GrantRole::ReadCounter)?)?;
        let write = GrantMapping::map(handle, grant(GrantRole::WriteCounter)?)?;
        let data = GrantMapping::map(handle, grant(GrantRole::DataBuffer)?)?;
        let wake = match grants.get(GrantRole::WakeWord.index()) {
            Some(g) => Some(GrantMapping::map(handle, g)?),
            None => None,
        };

        let read_ptr = read.as_atomic::<AtomicU64>(RING_POSITION_SIZE, "read counter")?;
        let write_ptr = write.as_atomic::<AtomicU64>(RING_POSITION_SIZE, "write counter")?;
        let wake_ptr = match &wake {
            Some(m) => Some(m.as_atomic::<AtomicU32>(WAKE_WORD_SIZE, "wake word")?),
            None => None,
        };

        Ok(Self {
            read,
            write,
            data,
            wake,
            read_ptr,
            write_ptr,
            wake_ptr,
            quantum,
            flavor,
        })
    }

    /// Shared read counter
    #[inline(always)]
    pub fn read_position(&self) -> &AtomicU64 {
        unsafe { &*self.read_ptr }
    }

    /// Shared write counter
    #[inline(always)]
    pub fn write_position(&self) -> &AtomicU64 {
        unsafe { &*self.write_ptr }
    }

    /// Shared wake word, if the descriptor reserved one
    #[inline]
    pub fn wake_word(&self) -> Option<&AtomicU32> {
        self.wake_ptr.map(|p| unsafe { &*p })
    }

    /// Start of the data ring
    #[inline(always)]
    pub fn data_ptr(&self) -> *mut u8 {
        self.data.as_ptr()
    }

    /// Data ring length in bytes
    #[inline(always)]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Number of elements the ring holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len() / self.quantum.max(1) as usize
    }

    #[inline(always)]
    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    #[inline(always)]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Bytes written but not yet read, from the counters' point of view
    pub fn pending(&self) -> RingPosition {
        use std::sync::atomic::Ordering;
        let write = self.write_position().load(Ordering::Acquire);
        let read = self.read_position().load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Raw mappings, for engines that place their own structures in them
    pub fn grant_mappings(&self) -> impl Iterator<Item = &GrantMapping> {
        [&self.read, &self.write, &self.data]
            .into_iter()
            .chain(self.wake.as_ref())
    }
}
