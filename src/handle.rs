//! Ownership of the OS handles behind a descriptor
//!
//! An [`OpaqueHandle`] owns zero or more region file descriptors plus a list
//! of auxiliary integers. It is move-only: the only way to get a second
//! owner is [`OpaqueHandle::duplicate`], which `dup`s every descriptor so each
//! owner closes its own. [`HandleView`] is the borrowed form handed to code
//! that must not control lifetime.

use crate::error::{DescriptorError, Result};
use rustix::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use rustix::io::fcntl_dupfd_cloexec;
use std::fmt;

/// Owned bundle of region descriptors and auxiliary integers
pub struct OpaqueHandle {
    fds: Vec<OwnedFd>,
    ints: Vec<i32>,
}

impl OpaqueHandle {
    /// Take ownership of `fds`; `ints` are carried by value
    pub fn new(fds: Vec<OwnedFd>, ints: Vec<i32>) -> Self {
        Self { fds, ints }
    }

    /// Handle over a single region with no auxiliary integers
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self::new(vec![fd], Vec::new())
    }

    /// Number of owned regions
    #[inline]
    pub fn fd_count(&self) -> usize {
        self.fds.len()
    }

    /// Number of auxiliary integers
    #[inline]
    pub fn int_count(&self) -> usize {
        self.ints.len()
    }

    /// Region at `index`
    pub fn fd(&self, index: usize) -> Option<BorrowedFd<'_>> {
        self.fds.get(index).map(AsFd::as_fd)
    }

    /// Auxiliary integers
    #[inline]
    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    /// Raw descriptor numbers, for marshalling
    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(AsRawFd::as_raw_fd).collect()
    }

    /// Whether every owned region has been released
    #[inline]
    pub fn is_released(&self) -> bool {
        self.fds.is_empty()
    }

    /// Independent owner of the same regions
    ///
    /// Every descriptor is duplicated; auxiliary integers are copied. If any
    /// duplicate fails, the ones already made are closed before returning
    /// [`DescriptorError::ResourceExhausted`].
    pub fn duplicate(&self) -> Result<Self> {
        self.view().to_owned_handle()
    }

    /// Close every owned region. Calling it again does nothing.
    pub fn release(&mut self) {
        if self.fds.is_empty() && self.ints.is_empty() {
            return;
        }
        let count = self.fds.len();
        self.fds.clear();
        self.ints.clear();
        log::debug!("released handle with {} regions", count);
    }

    /// Non-owning view of the same regions
    #[inline]
    pub fn view(&self) -> HandleView<'_> {
        HandleView {
            fds: &self.fds,
            ints: &self.ints,
        }
    }
}

impl Drop for OpaqueHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueHandle")
            .field("fds", &self.raw_fds())
            .field("ints", &self.ints)
            .finish()
    }
}

/// Borrowed view of an [`OpaqueHandle`]
///
/// Exposes the same regions but releases nothing when dropped.
#[derive(Clone, Copy)]
pub struct HandleView<'a> {
    fds: &'a [OwnedFd],
    ints: &'a [i32],
}

impl<'a> HandleView<'a> {
    #[inline]
    pub fn fd_count(&self) -> usize {
        self.fds.len()
    }

    pub fn fd(&self, index: usize) -> Option<BorrowedFd<'a>> {
        self.fds.get(index).map(AsFd::as_fd)
    }

    #[inline]
    pub fn ints(&self) -> &'a [i32] {
        self.ints
    }

    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(AsRawFd::as_raw_fd).collect()
    }

    /// Owned duplicate of the viewed regions
    pub fn to_owned_handle(&self) -> Result<OpaqueHandle> {
        let fds = self
            .fds
            .iter()
            .map(|fd| {
                fcntl_dupfd_cloexec(fd, 0)
                    .map_err(|e| DescriptorError::ResourceExhausted { source: e.into() })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("duplicated handle with {} regions", fds.len());
        Ok(OpaqueHandle {
            fds,
            ints: self.ints.to_vec(),
        })
    }
}

impl fmt::Debug for HandleView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleView")
            .field("fds", &self.raw_fds())
            .field("ints", &self.ints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{create_region, same_region};

    fn two_region_handle() -> OpaqueHandle {
        let a = create_region("test_handle_a", 4096).unwrap();
        let b = create_region("test_handle_b", 4096).unwrap();
        OpaqueHandle::new(vec![a, b], vec![7, 11])
    }

    #[test]
    fn test_duplicate_gives_new_fds_for_same_regions() {
        let original = two_region_handle();
        let copy = original.duplicate().unwrap();

        assert_eq!(copy.fd_count(), 2);
        assert_eq!(copy.ints(), &[7, 11]);
        for i in 0..2 {
            let a = original.fd(i).unwrap();
            let b = copy.fd(i).unwrap();
            assert_ne!(a.as_raw_fd(), b.as_raw_fd());
            assert!(same_region(a, b).unwrap());
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut handle = two_region_handle();
        handle.release();
        assert!(handle.is_released());
        assert_eq!(handle.int_count(), 0);
        handle.release();
        assert!(handle.is_released());
        drop(handle);
    }

    #[test]
    fn test_release_leaves_duplicate_usable() {
        let mut original = two_region_handle();
        let copy = original.duplicate().unwrap();
        original.release();

        let fd = copy.fd(0).unwrap();
        assert_eq!(crate::region::region_size(fd).unwrap(), 4096);
    }

    #[test]
    fn test_view_does_not_own() {
        let handle = two_region_handle();
        let raw = handle.raw_fds();
        {
            let view = handle.view();
            assert_eq!(view.fd_count(), 2);
            assert_eq!(view.raw_fds(), raw);
            assert_eq!(view.ints(), &[7, 11]);
        }
        // Still open after the view is gone.
        assert!(crate::region::region_size(handle.fd(1).unwrap()).is_ok());
    }

    #[test]
    fn test_view_to_owned_duplicates() {
        let handle = two_region_handle();
        let owned = handle.view().to_owned_handle().unwrap();
        assert_eq!(owned.fd_count(), 2);
        assert_eq!(owned.ints(), handle.ints());
        assert_ne!(owned.raw_fds(), handle.raw_fds());
    }

    #[test]
    fn test_empty_handle() {
        let handle = OpaqueHandle::new(Vec::new(), vec![1]);
        let copy = handle.duplicate().unwrap();
        assert_eq!(copy.fd_count(), 0);
        assert_eq!(copy.ints(), &[1]);
        assert!(handle.fd(0).is_none());
    }
}
