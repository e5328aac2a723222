//! Host callbacks reachable from the native module.
//!
//! The module calls back through a single entry point, [`callback_proxy`],
//! which resolves the handle in the process-wide registry and hands the
//! result back in a module-allocated buffer.

use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use libevm_interop::Handle;
use tracing::{error, warn};

use crate::buffer;
use crate::gateway::LibEvm;
use crate::registry::{panic_message, registry, CallbackRegistry};

/// A callback the native module can invoke by handle.
///
/// `args` is the JSON payload of the native request. Returning `None` hands
/// a null result to the module.
pub trait LibEvmCallback: Send + Sync {
    fn invoke(&self, args: &str) -> Option<String>;
}

/// Registration guard: registers on construction and unregisters exactly
/// once, on [`close`](CallbackHandle::close) or drop.
pub struct CallbackHandle<'r, C: LibEvmCallback + 'static> {
    registry: &'r CallbackRegistry,
    callback: Arc<C>,
    handle: Handle,
    released: bool,
}

impl<C: LibEvmCallback + 'static> CallbackHandle<'static, C> {
    /// Register `callback` in the process-wide registry.
    pub fn register(callback: C) -> Self {
        Self::register_in(registry(), callback)
    }
}

impl<'r, C: LibEvmCallback + 'static> CallbackHandle<'r, C> {
    pub fn register_in(registry: &'r CallbackRegistry, callback: C) -> Self {
        let callback = Arc::new(callback);
        let handle = registry.register(callback.clone());
        Self {
            registry,
            callback,
            handle,
            released: false,
        }
    }

    /// Handle to pass in request payloads.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Release the registration now.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let callback: Arc<dyn LibEvmCallback> = self.callback.clone();
        self.registry.unregister(self.handle, &callback);
    }
}

impl<C: LibEvmCallback + 'static> Drop for CallbackHandle<'_, C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: LibEvmCallback + 'static> std::fmt::Debug for CallbackHandle<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish()
    }
}

/// Entry point installed with `SetCallbackProxy`.
///
/// Never unwinds into the module: every failure is logged and becomes a
/// null result.
pub(crate) unsafe extern "C" fn callback_proxy(handle: c_int, args: *const c_char) -> *mut c_char {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the module keeps `args` alive for the duration of the call.
        let args = match unsafe { buffer::read_borrowed_string(args) } {
            Ok(args) => args,
            Err(buffer::BufferError::Null) => String::new(),
            Err(e) => {
                warn!(handle, error = %e, "unreadable callback arguments");
                return ptr::null_mut();
            }
        };
        let Some(result) = registry().dispatch(handle, &args) else {
            return ptr::null_mut();
        };
        match LibEvm::get() {
            Ok(libevm) => buffer::write_native_string(libevm.api(), &result),
            Err(_) => {
                warn!(handle, "callback result dropped: gateway not initialized");
                ptr::null_mut()
            }
        }
    }));
    outcome.unwrap_or_else(|payload| {
        error!(handle, panic = panic_message(payload.as_ref()), "panic in callback proxy");
        ptr::null_mut()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl LibEvmCallback for Counter {
        fn invoke(&self, _args: &str) -> Option<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Some(n.to_string())
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = CallbackRegistry::new();
        let handle = {
            let guard = CallbackHandle::register_in(&registry, Counter(AtomicUsize::new(0)));
            assert!(registry.contains(guard.handle()));
            guard.handle()
        };
        assert!(!registry.contains(handle));
    }

    #[test]
    fn test_guard_close_releases_once() {
        let registry = CallbackRegistry::new();
        let first = CallbackHandle::register_in(&registry, Counter(AtomicUsize::new(0)));
        let handle = first.handle();
        first.close();
        // the freed handle is reused; the closed guard must not release it again
        let second = CallbackHandle::register_in(&registry, Counter(AtomicUsize::new(0)));
        assert_eq!(second.handle(), handle);
        assert!(registry.contains(handle));
    }

    #[test]
    fn test_dispatch_reaches_guarded_callback() {
        let registry = CallbackRegistry::new();
        let guard = CallbackHandle::register_in(&registry, Counter(AtomicUsize::new(0)));
        assert_eq!(registry.dispatch(guard.handle(), "").as_deref(), Some("1"));
        assert_eq!(registry.dispatch(guard.handle(), "").as_deref(), Some("2"));
        assert_eq!(guard.callback().0.load(Ordering::SeqCst), 2);
    }
}
