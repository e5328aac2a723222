//! Native call gateway: named synchronous calls across the boundary.
//!
//! [`LibEvm`] is the main entry point. It binds to one native module per
//! process (loaded from a shared library, or given as a function table),
//! installs the callback proxy and log bridge, and then serves calls:
//!
//! 1. encode arguments as JSON (absent arguments pass a null pointer)
//! 2. call `Invoke(method, args)`
//! 3. copy the response and release it with `FreeBuffer`
//! 4. decode the `{error, result}` envelope
//!
//! Calls hold no state between each other and may nest: a callback running
//! inside a call may issue further calls.

use std::ffi::CString;
use std::ptr;
use std::sync::Arc;

use libevm_interop::{codec, decode_envelope, Handle, NativeApi};
use once_cell::sync::OnceCell;
use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};
use tracing::{debug, info, trace};

use crate::buffer;
use crate::callback::callback_proxy;
use crate::config::LibEvmConfig;
use crate::error::GatewayError;
use crate::library::NativeLibrary;
use crate::logging::{native_level, LogCallback};
use crate::registry::registry;

static LIBEVM: OnceCell<LibEvm> = OnceCell::new();

/// Process-wide gateway to a native module.
pub struct LibEvm {
    api: NativeApi,
    log_handle: Handle,
    // keeps the shared library mapped for the process lifetime
    _library: Option<NativeLibrary>,
}

impl LibEvm {
    /// Bind the gateway to a native module given by its function table.
    ///
    /// Idempotent for the same module; binding a different module fails
    /// with [`GatewayError::AlreadyInitialized`].
    pub fn init(api: NativeApi, config: &LibEvmConfig) -> Result<&'static LibEvm, GatewayError> {
        Self::install(api, None, config)
    }

    /// Load the shared library named by `config` and bind the gateway to it.
    pub fn load(config: &LibEvmConfig) -> Result<&'static LibEvm, GatewayError> {
        if let Some(existing) = LIBEVM.get() {
            return Ok(existing);
        }
        let library = NativeLibrary::load(&config.library_path)?;
        Self::install(library.api(), Some(library), config)
    }

    /// The installed gateway.
    pub fn get() -> Result<&'static LibEvm, GatewayError> {
        LIBEVM.get().ok_or(GatewayError::NotInitialized)
    }

    fn install(
        api: NativeApi,
        library: Option<NativeLibrary>,
        config: &LibEvmConfig,
    ) -> Result<&'static LibEvm, GatewayError> {
        let libevm = LIBEVM.get_or_try_init(|| Self::setup(api, library, config))?;
        if !libevm.api.same_module(&api) {
            return Err(GatewayError::AlreadyInitialized);
        }
        Ok(libevm)
    }

    fn setup(
        api: NativeApi,
        library: Option<NativeLibrary>,
        config: &LibEvmConfig,
    ) -> Result<LibEvm, GatewayError> {
        // SAFETY: callback_proxy matches the proxy signature and lives for the process.
        unsafe { (api.set_callback_proxy)(Some(callback_proxy)) };

        let log_handle = registry().register_log(Arc::new(LogCallback));
        let level = native_level(config.log_level);
        let c_level = c_string(level)?;
        // SAFETY: c_level is a valid NUL-terminated string for the call.
        unsafe { (api.setup_logging)(log_handle, c_level.as_ptr()) };

        info!(log_handle, level, "libevm gateway initialized");
        Ok(LibEvm {
            api,
            log_handle,
            _library: library,
        })
    }

    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    /// Callback handle receiving native log records.
    pub fn log_handle(&self) -> Handle {
        self.log_handle
    }

    /// Call `method` and decode its result.
    ///
    /// `args == None` passes a null payload. A non-empty envelope error is
    /// returned as [`GatewayError::Operation`]; anything that is not a
    /// well-formed envelope is a [`GatewayError::Protocol`].
    pub fn invoke<A, R>(&self, method: &str, args: Option<&A>) -> Result<R, GatewayError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let encoded = args.map(codec::to_json).transpose()?;
        let c_method = c_string(method)?;
        let c_args = encoded.as_deref().map(c_string).transpose()?;
        let args_ptr = c_args.as_ref().map_or(ptr::null(), |a| a.as_ptr());

        trace!(method, args = encoded.as_deref().unwrap_or(""), "invoke");
        // SAFETY: both strings outlive the call; the response is owned by the module.
        let response_ptr = unsafe { (self.api.invoke)(c_method.as_ptr(), args_ptr) };
        // SAFETY: the response comes from this module and is released exactly once here.
        let response = unsafe { buffer::take_native_string(&self.api, response_ptr) }.map_err(|e| {
            GatewayError::Protocol {
                method: method.to_string(),
                reason: format!("unreadable response: {}", e),
            }
        })?;

        match decode_envelope::<R>(&response) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => {
                debug!(method, message = %message, "native operation failed");
                Err(GatewayError::Operation {
                    method: method.to_string(),
                    args: encoded.unwrap_or_default(),
                    message,
                })
            }
            Err(e) => Err(GatewayError::Protocol {
                method: method.to_string(),
                reason: format!("malformed envelope: {}", e),
            }),
        }
    }

    // ── Call shapes ──

    /// No arguments, typed result.
    pub fn call<R: DeserializeOwned>(&self, method: &str) -> Result<R, GatewayError> {
        self.invoke::<(), R>(method, None)
    }

    /// Arguments, typed result.
    pub fn call_with<A: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: &str,
        args: &A,
    ) -> Result<R, GatewayError> {
        self.invoke(method, Some(args))
    }

    /// No arguments, result ignored.
    pub fn execute(&self, method: &str) -> Result<(), GatewayError> {
        self.invoke::<(), IgnoredAny>(method, None).map(|_| ())
    }

    /// Arguments, result ignored.
    pub fn execute_with<A: Serialize + ?Sized>(
        &self,
        method: &str,
        args: &A,
    ) -> Result<(), GatewayError> {
        self.invoke::<A, IgnoredAny>(method, Some(args)).map(|_| ())
    }
}

impl std::fmt::Debug for LibEvm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibEvm")
            .field("api", &self.api)
            .field("log_handle", &self.log_handle)
            .field("library", &self._library)
            .finish()
    }
}

/// NUL-terminated copy of `s`; the error carries the offending text.
fn c_string(s: &str) -> Result<CString, GatewayError> {
    CString::new(s).map_err(|_| GatewayError::InvalidString(s.to_string()))
}
