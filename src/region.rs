//! Backing regions for queue descriptors
//!
//! Regions are anonymous `memfd`s: they have no name in any filesystem and
//! live exactly as long as some descriptor or mapping still references them.

use crate::error::{DescriptorError, Result};
use rustix::fd::{AsFd, OwnedFd};
use rustix::fs::{fstat, ftruncate, memfd_create, MemfdFlags};
use std::ffi::CString;

/// Kernel limit on memfd names, excluding the "memfd:" prefix
const MAX_NAME_LEN: usize = 249;

/// Create a zero-filled shared memory region of `size` bytes
pub fn create_region(name: &str, size: usize) -> Result<OwnedFd> {
    if name.len() > MAX_NAME_LEN {
        return Err(DescriptorError::NameTooLong {
            max: MAX_NAME_LEN,
            got: name.len(),
        });
    }

    let c_name =
        CString::new(name).map_err(|_| DescriptorError::InvalidName(name.to_string()))?;

    let fd = memfd_create(c_name.as_c_str(), MemfdFlags::CLOEXEC).map_err(|e| {
        DescriptorError::RegionCreate {
            name: name.to_string(),
            source: e.into(),
        }
    })?;

    ftruncate(&fd, size as u64).map_err(|e| DescriptorError::Truncate(e.into()))?;

    log::debug!("created region '{}' of {} bytes", name, size);
    Ok(fd)
}

/// Current size of a region in bytes
pub fn region_size<Fd: AsFd>(fd: Fd) -> Result<usize> {
    let stat = fstat(fd).map_err(|e| DescriptorError::Stat(e.into()))?;
    Ok(stat.st_size as usize)
}

/// Whether two descriptors refer to the same underlying memory object
pub fn same_region<A: AsFd, B: AsFd>(a: A, b: B) -> Result<bool> {
    let a = fstat(a).map_err(|e| DescriptorError::Stat(e.into()))?;
    let b = fstat(b).map_err(|e| DescriptorError::Stat(e.into()))?;
    Ok(a.st_dev == b.st_dev && a.st_ino == b.st_ino)
}
