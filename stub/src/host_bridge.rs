//! Calls from the native side into the host through the callback proxy.
//!
//! Arguments are passed as a NUL-terminated string owned by this module for
//! the duration of the call. A non-null result must come from
//! `CreateBuffer`; it is copied and released here exactly once.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};

use libevm_interop::abi::CallbackProxy;
use libevm_interop::Handle;
use parking_lot::RwLock;

use crate::alloc;
use crate::error::{StubError, StubResult};

static PROXY: RwLock<Option<CallbackProxy>> = parking_lot::const_rwlock(None);

pub fn set_proxy(proxy: Option<CallbackProxy>) {
    *PROXY.write() = proxy;
}

pub fn has_proxy() -> bool {
    PROXY.read().is_some()
}

/// Invoke the host callback `handle` with `args`.
///
/// `expect_result` states whether the callback must answer. A missing
/// answer where one is expected, or an answer where none is, is an error.
pub fn invoke(handle: Handle, args: &str, expect_result: bool) -> StubResult<Option<String>> {
    let proxy =
        (*PROXY.read()).ok_or_else(|| StubError::Callback("callback proxy not set".into()))?;
    let args = CString::new(args).map_err(|_| StubError::Callback("argument contains NUL".into()))?;

    // SAFETY: the proxy was installed by the host and outlives the module.
    let result = unsafe { proxy(handle as c_int, args.as_ptr()) };
    let output = if result.is_null() {
        None
    } else {
        // SAFETY: non-null results are NUL-terminated buffers from CreateBuffer.
        let copied = unsafe { CStr::from_ptr(result) }.to_str().map(str::to_owned);
        unsafe { alloc::free_buffer(result as *mut c_void) };
        Some(copied.map_err(|_| StubError::Callback("result is not valid UTF-8".into()))?)
    };

    match (output, expect_result) {
        (None, true) => Err(StubError::Callback(format!(
            "callback {} returned no result",
            handle
        ))),
        (Some(_), false) => Err(StubError::Callback(format!(
            "callback {} returned an unexpected result",
            handle
        ))),
        (output, _) => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::os::raw::c_char;

    // Tests share the global proxy slot.
    static LOCK: Mutex<()> = parking_lot::const_mutex(());

    unsafe extern "C" fn echo(_handle: c_int, args: *const c_char) -> *mut c_char {
        let args = CStr::from_ptr(args).to_str().unwrap_or_default();
        alloc::allocate_string(args)
    }

    unsafe extern "C" fn silent(_handle: c_int, _args: *const c_char) -> *mut c_char {
        std::ptr::null_mut()
    }

    #[test]
    fn test_echo_result_freed() {
        let _guard = LOCK.lock();
        set_proxy(Some(echo));
        let before = alloc::stats();
        assert_eq!(invoke(3, "\"ping\"", true).unwrap().as_deref(), Some("\"ping\""));
        let delta = alloc::stats().since(&before);
        assert_eq!(delta.outstanding(), 0);
        assert_eq!(delta.invalid_frees, 0);
        set_proxy(None);
    }

    #[test]
    fn test_result_expectation() {
        let _guard = LOCK.lock();
        set_proxy(Some(silent));
        assert!(invoke(1, "{}", true).is_err());
        assert_eq!(invoke(1, "{}", false).unwrap(), None);
        set_proxy(Some(echo));
        assert!(invoke(1, "{}", false).is_err());
        set_proxy(None);
    }

    #[test]
    fn test_missing_proxy() {
        let _guard = LOCK.lock();
        set_proxy(None);
        assert!(!has_proxy());
        assert!(matches!(invoke(1, "{}", true), Err(StubError::Callback(_))));
    }
}
