//! Buffer ownership protocol at the boundary.
//!
//! - Call results are module-owned: copied into a `String`, then released
//!   with `FreeBuffer` exactly once, also when the copy fails
//! - Callback arguments are borrowed: copied, never released by the host
//! - Callback results are allocated with `CreateBuffer(len + 1)`, filled and
//!   NUL-terminated; the module releases them. Absent results are null

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::ptr;

use libevm_interop::NativeApi;
use tracing::warn;

/// Failure to read a NUL-terminated string from the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("null pointer")]
    Null,

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Copy a module-owned string and release it.
///
/// # Safety
/// `ptr` must be null or a NUL-terminated buffer allocated by the module
/// behind `api`, not yet released.
pub unsafe fn take_native_string(api: &NativeApi, ptr: *mut c_char) -> Result<String, BufferError> {
    if ptr.is_null() {
        return Err(BufferError::Null);
    }
    let copied = CStr::from_ptr(ptr).to_str().map(str::to_owned);
    (api.free_buffer)(ptr as *mut c_void);
    Ok(copied?)
}

/// Copy a borrowed string without taking ownership.
///
/// # Safety
/// `ptr` must be null or a NUL-terminated buffer valid for the duration of
/// the call.
pub unsafe fn read_borrowed_string(ptr: *const c_char) -> Result<String, BufferError> {
    if ptr.is_null() {
        return Err(BufferError::Null);
    }
    Ok(CStr::from_ptr(ptr).to_str()?.to_owned())
}

/// Hand `value` to the module in a freshly allocated buffer.
///
/// Returns null if the module cannot allocate the buffer; the failure is
/// logged and not propagated.
pub fn write_native_string(api: &NativeApi, value: &str) -> *mut c_char {
    let bytes = value.as_bytes();
    let Ok(size) = c_int::try_from(bytes.len() + 1) else {
        warn!(len = bytes.len(), "callback result too large for a native buffer");
        return ptr::null_mut();
    };
    // SAFETY: create_buffer returns null or a writable buffer of `size` bytes.
    unsafe {
        let buffer = (api.create_buffer)(size) as *mut u8;
        if buffer.is_null() {
            warn!(size, "native buffer allocation failed, dropping callback result");
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
        *buffer.add(bytes.len()) = 0;
        buffer as *mut c_char
    }
}
