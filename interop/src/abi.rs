//! C ABI of a libevm native module.
//!
//! A native module exports exactly five functions:
//!
//! - `Invoke(method, args) -> char*`: call a named method with a JSON payload
//!   (or null for no payload) and return a JSON envelope allocated by the module
//! - `CreateBuffer(size) -> void*`: allocate a zero-initialized buffer the module will free
//! - `FreeBuffer(ptr)`: release a buffer the module allocated
//! - `SetCallbackProxy(proxy)`: install the single host entry point for callbacks
//! - `SetupLogging(handle, level)`: route native logs to a callback handle
//!
//! Buffer ownership is described on each field of [`NativeApi`].

use std::os::raw::{c_char, c_int, c_void};

/// Host entry point invoked by the native module for every callback.
///
/// `args` is a NUL-terminated JSON string owned by the native module; it is
/// only valid for the duration of the call. The return value is either null
/// (no result) or a NUL-terminated buffer obtained from `CreateBuffer`, which
/// the native module frees after reading.
pub type CallbackProxy = unsafe extern "C" fn(handle: c_int, args: *const c_char) -> *mut c_char;

/// `Invoke` symbol signature.
pub type InvokeFn = unsafe extern "C" fn(method: *const c_char, args: *const c_char) -> *mut c_char;
/// `CreateBuffer` symbol signature.
pub type CreateBufferFn = unsafe extern "C" fn(size: c_int) -> *mut c_void;
/// `FreeBuffer` symbol signature.
pub type FreeBufferFn = unsafe extern "C" fn(ptr: *mut c_void);
/// `SetCallbackProxy` symbol signature.
pub type SetCallbackProxyFn = unsafe extern "C" fn(proxy: Option<CallbackProxy>);
/// `SetupLogging` symbol signature.
pub type SetupLoggingFn = unsafe extern "C" fn(handle: c_int, level: *const c_char);

/// Exported symbol names, in resolution order.
pub const SYMBOL_INVOKE: &str = "Invoke";
pub const SYMBOL_CREATE_BUFFER: &str = "CreateBuffer";
pub const SYMBOL_FREE_BUFFER: &str = "FreeBuffer";
pub const SYMBOL_SET_CALLBACK_PROXY: &str = "SetCallbackProxy";
pub const SYMBOL_SETUP_LOGGING: &str = "SetupLogging";

/// All symbols a native module must export.
pub const REQUIRED_SYMBOLS: &[&str] = &[
    SYMBOL_INVOKE,
    SYMBOL_CREATE_BUFFER,
    SYMBOL_FREE_BUFFER,
    SYMBOL_SET_CALLBACK_PROXY,
    SYMBOL_SETUP_LOGGING,
];

/// Function table of a loaded native module.
///
/// All function pointers must be valid for the lifetime of the process
/// (or of the library that provides them).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NativeApi {
    /// Call a named method.
    ///
    /// # Ownership
    /// - `method` and `args` are host-owned and only read during the call
    /// - the returned envelope is module-owned; the host copies it and then
    ///   releases it with `free_buffer` exactly once
    pub invoke: InvokeFn,

    /// Allocate a zero-initialized buffer of `size` bytes, or null on failure.
    ///
    /// Used by the host to hand callback results to the module, which frees them.
    pub create_buffer: CreateBufferFn,

    /// Release a module-allocated buffer.
    ///
    /// # Safety
    /// - `ptr` must come from this module
    /// - must not be called twice for the same pointer
    pub free_buffer: FreeBufferFn,

    /// Install (or clear, with `None`) the host callback entry point.
    pub set_callback_proxy: SetCallbackProxyFn,

    /// Route native log records to the callback `handle` at `level`
    /// (`trace`, `debug`, `info`, `warn`, `error`, `crit`).
    pub setup_logging: SetupLoggingFn,
}

impl NativeApi {
    /// Whether two tables refer to the same module entry points.
    pub fn same_module(&self, other: &NativeApi) -> bool {
        self.invoke as usize == other.invoke as usize
            && self.create_buffer as usize == other.create_buffer as usize
            && self.free_buffer as usize == other.free_buffer as usize
    }
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("invoke", &(self.invoke as usize as *const c_void))
            .field("create_buffer", &(self.create_buffer as usize as *const c_void))
            .field("free_buffer", &(self.free_buffer as usize as *const c_void))
            .finish_non_exhaustive()
    }
}
