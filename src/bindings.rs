//! C bindings for queue descriptors
//!
//! Exposes the published layout constants and an opaque-pointer API for
//! creating, duplicating and inspecting descriptors from foreign code.

use crate::config::QueueConfig;
use crate::descriptor::{AnyDescriptor, OFFSET_OF_GRANTS, OFFSET_OF_HANDLE};
use crate::flavor::Flavor;
use crate::grant::{Grant, MIN_GRANT_COUNT, MIN_GRANT_COUNT_WITH_WAKE_WORD};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;

use rustix::fd::AsRawFd;

/// Byte offset of the grant list inside a descriptor
#[no_mangle]
pub static MQ_DESCRIPTOR_OFFSET_OF_GRANTS: usize = OFFSET_OF_GRANTS;

/// Byte offset of the handle inside a descriptor
#[no_mangle]
pub static MQ_DESCRIPTOR_OFFSET_OF_HANDLE: usize = OFFSET_OF_HANDLE;

#[no_mangle]
pub static MQ_MIN_GRANT_COUNT: u32 = MIN_GRANT_COUNT as u32;

#[no_mangle]
pub static MQ_MIN_GRANT_COUNT_WITH_WAKE_WORD: u32 = MIN_GRANT_COUNT_WITH_WAKE_WORD as u32;

#[no_mangle]
pub static MQ_FLAVOR_STRICT: u32 = Flavor::Strict.bits();

#[no_mangle]
pub static MQ_FLAVOR_RELAXED_WRITE: u32 = Flavor::RelaxedWrite.bits();

// Opaque handle
pub struct MqDescriptorHandle(AnyDescriptor);

#[repr(C)]
pub struct MqConfig {
    pub buffer_size: usize,
    pub message_size: u32,
    pub wake_word: bool,
}

/// Allocate a new queue region and its descriptor
///
/// Returns null on failure.
///
/// # Safety
/// `name` must be null or a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_create(
    flavor: u32,
    name: *const c_char,
    config: MqConfig,
) -> *mut MqDescriptorHandle {
    let flavor = match Flavor::from_bits(flavor) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("mq_descriptor_create: {}", e);
            return ptr::null_mut();
        }
    };

    let mut rust_config = QueueConfig {
        buffer_size: config.buffer_size,
        message_size: config.message_size,
        wake_word: config.wake_word,
        ..QueueConfig::default()
    };
    if !name.is_null() {
        match CStr::from_ptr(name).to_str() {
            Ok(s) => rust_config.region_name = s.to_string(),
            Err(_) => return ptr::null_mut(),
        }
    }

    match AnyDescriptor::allocate(flavor, &rust_config) {
        Ok(desc) => Box::into_raw(Box::new(MqDescriptorHandle(desc))),
        Err(e) => {
            log::warn!("mq_descriptor_create: {}", e);
            ptr::null_mut()
        }
    }
}

/// Duplicate a descriptor, giving the copy its own region handles
///
/// Returns null on failure.
///
/// # Safety
/// `handle` must be null or a pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_duplicate(
    handle: *const MqDescriptorHandle,
) -> *mut MqDescriptorHandle {
    if handle.is_null() {
        return ptr::null_mut();
    }
    match (*handle).0.duplicate() {
        Ok(desc) => Box::into_raw(Box::new(MqDescriptorHandle(desc))),
        Err(e) => {
            log::warn!("mq_descriptor_duplicate: {}", e);
            ptr::null_mut()
        }
    }
}

/// Destroy a descriptor, closing the regions it owns
///
/// # Safety
/// `handle` must be null or a pointer returned by this API, not yet destroyed
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_destroy(handle: *mut MqDescriptorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Number of grants
///
/// # Safety
/// `handle` must be null or a valid pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_grant_count(handle: *const MqDescriptorHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.grants().len()
}

/// Copy grant `index` into `out`
///
/// Returns false if `index` is past the end.
///
/// # Safety
/// `handle` must be null or a valid pointer returned by this API; `out` must be
/// null or writable
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_get_grant(
    handle: *const MqDescriptorHandle,
    index: usize,
    out: *mut Grant,
) -> bool {
    if handle.is_null() || out.is_null() {
        return false;
    }
    match (*handle).0.grant_at(index) {
        Ok(grant) => {
            *out = *grant;
            true
        }
        Err(_) => false,
    }
}

/// Data ring size in bytes, 0 for a placeholder
///
/// # Safety
/// `handle` must be null or a valid pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_size(handle: *const MqDescriptorHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.size().unwrap_or(0)
}

/// # Safety
/// `handle` must be null or a valid pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_quantum(handle: *const MqDescriptorHandle) -> u32 {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.quantum()
}

/// # Safety
/// `handle` must be null or a valid pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_flags(handle: *const MqDescriptorHandle) -> u32 {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.flags()
}

/// Borrowed file descriptor of region `index`, or -1
///
/// The descriptor stays owned by `handle`; callers must not close it.
///
/// # Safety
/// `handle` must be null or a valid pointer returned by this API
#[no_mangle]
pub unsafe extern "C" fn mq_descriptor_fd(
    handle: *const MqDescriptorHandle,
    index: usize,
) -> c_int {
    if handle.is_null() {
        return -1;
    }
    (*handle)
        .0
        .native_handle()
        .and_then(|view| view.fd(index))
        .map_or(-1, |fd| fd.as_raw_fd())
}
