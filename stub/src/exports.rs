//! Exported C entry points.
//!
//! - `Invoke` runs a method and returns an envelope from `CreateBuffer`
//! - `CreateBuffer` / `FreeBuffer` expose the module allocator
//! - `SetCallbackProxy` installs the host callback entry point
//! - `SetupLogging` routes native log records to a host callback
//!
//! None of them unwind across the boundary: panics are caught and turned
//! into an error envelope or ignored.

#![allow(non_snake_case)]

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};

use libevm_interop::abi::CallbackProxy;
use libevm_interop::Envelope;

use crate::{alloc, host_bridge, log, service};

/// # Safety
/// `method` must be a valid NUL-terminated string; `args` null or one.
#[no_mangle]
pub unsafe extern "C" fn Invoke(method: *const c_char, args: *const c_char) -> *mut c_char {
    let response = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(method) = read_str(method) else {
            return failure("method name is not a valid string");
        };
        let args = if args.is_null() {
            None
        } else {
            match read_str(args) {
                Some(args) => Some(args),
                None => return failure("arguments are not a valid string"),
            }
        };
        service::service().invoke(method, args)
    }))
    .unwrap_or_else(|_| failure("native panic"));
    alloc::allocate_string(&response)
}

#[no_mangle]
pub extern "C" fn CreateBuffer(size: c_int) -> *mut c_void {
    alloc::create_buffer(size)
}

/// # Safety
/// `ptr` must be null or come from `CreateBuffer`, and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn FreeBuffer(ptr: *mut c_void) {
    alloc::free_buffer(ptr)
}

#[no_mangle]
pub extern "C" fn SetCallbackProxy(proxy: Option<CallbackProxy>) {
    host_bridge::set_proxy(proxy);
}

/// # Safety
/// `level` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn SetupLogging(handle: c_int, level: *const c_char) {
    let level = read_str(level).unwrap_or("info");
    let _ = panic::catch_unwind(|| log::setup(handle, level));
}

unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn failure(message: &str) -> String {
    serde_json::to_string(&Envelope::<()>::failure(message))
        .unwrap_or_else(|_| r#"{"error":"unknown error"}"#.to_string())
}
