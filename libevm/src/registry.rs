//! Callback registry: small integer handles for host callbacks.
//!
//! The native module can only carry integers, so every host callback it may
//! reach is registered here and named by its handle. Handles are compact:
//! registration takes the lowest free handle, starting at 1. Handle 0
//! ([`LOG_CALLBACK_HANDLE`]) belongs to the log bridge and is only ever
//! filled by [`CallbackRegistry::register_log`].
//!
//! The map is guarded by one mutex. Callbacks run outside the lock, so a
//! callback may re-enter the gateway (and through it, the registry).

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use libevm_interop::{Handle, LOG_CALLBACK_HANDLE};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::callback::LibEvmCallback;

static REGISTRY: Lazy<CallbackRegistry> = Lazy::new(CallbackRegistry::new);

/// The process-wide registry reached by the native callback proxy.
pub fn registry() -> &'static CallbackRegistry {
    &REGISTRY
}

#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: Mutex<HashMap<Handle, Arc<dyn LibEvmCallback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under the lowest free handle above the log slot.
    pub fn register(&self, callback: Arc<dyn LibEvmCallback>) -> Handle {
        let mut callbacks = self.callbacks.lock();
        // 1..=len+1 always contains a free handle
        let mut handle: Handle = LOG_CALLBACK_HANDLE + 1;
        while callbacks.contains_key(&handle) {
            handle += 1;
        }
        callbacks.insert(handle, callback);
        debug!(handle, "registered callback");
        handle
    }

    /// Install the log bridge under [`LOG_CALLBACK_HANDLE`], replacing any
    /// earlier log bridge.
    pub fn register_log(&self, callback: Arc<dyn LibEvmCallback>) -> Handle {
        if self.callbacks.lock().insert(LOG_CALLBACK_HANDLE, callback).is_some() {
            debug!(handle = LOG_CALLBACK_HANDLE, "replaced log callback");
        }
        LOG_CALLBACK_HANDLE
    }

    /// Remove `handle` if it is mapped to this very callback instance.
    ///
    /// Returns whether a registration was removed. A stale or mismatched
    /// release is logged and leaves the registry untouched.
    pub fn unregister(&self, handle: Handle, callback: &Arc<dyn LibEvmCallback>) -> bool {
        let mut callbacks = self.callbacks.lock();
        match callbacks.get(&handle) {
            Some(existing) if same_instance(existing, callback) => {
                callbacks.remove(&handle);
                debug!(handle, "unregistered callback");
                true
            }
            Some(_) => {
                warn!(handle, "unregister ignored: handle belongs to another callback");
                false
            }
            None => {
                warn!(handle, "unregister ignored: handle not registered");
                false
            }
        }
    }

    /// Invoke the callback registered under `handle`.
    ///
    /// Unknown handles and panicking callbacks are logged and yield `None`.
    pub fn dispatch(&self, handle: Handle, args: &str) -> Option<String> {
        let callback = self.callbacks.lock().get(&handle).cloned();
        let Some(callback) = callback else {
            warn!(handle, "received invoke on unknown callback handle");
            return None;
        };
        match catch_unwind(AssertUnwindSafe(|| callback.invoke(args))) {
            Ok(result) => result,
            Err(payload) => {
                error!(handle, panic = panic_message(payload.as_ref()), "callback panicked");
                None
            }
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.callbacks.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handles: Vec<Handle> = self.callbacks.lock().keys().copied().collect();
        handles.sort_unstable();
        f.debug_struct("CallbackRegistry").field("handles", &handles).finish()
    }
}

/// Data-pointer identity, ignoring vtables.
fn same_instance(a: &Arc<dyn LibEvmCallback>, b: &Arc<dyn LibEvmCallback>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl LibEvmCallback for Echo {
        fn invoke(&self, args: &str) -> Option<String> {
            Some(args.to_string())
        }
    }

    struct Panics;

    impl LibEvmCallback for Panics {
        fn invoke(&self, _args: &str) -> Option<String> {
            panic!("callback exploded");
        }
    }

    fn echo() -> Arc<dyn LibEvmCallback> {
        Arc::new(Echo)
    }

    // ── Handle allocation ──

    #[test]
    fn test_handles_are_compact() {
        let registry = CallbackRegistry::new();
        let a = echo();
        let b = echo();
        let c = echo();
        assert_eq!(registry.register(a.clone()), 1);
        assert_eq!(registry.register(b), 2);
        assert_eq!(registry.register(c), 3);

        assert!(registry.unregister(1, &a));
        assert_eq!(registry.register(echo()), 1);
        assert_eq!(registry.register(echo()), 4);
    }

    #[test]
    fn test_fills_lowest_gap() {
        let registry = CallbackRegistry::new();
        let cbs: Vec<_> = (0..5).map(|_| echo()).collect();
        for cb in &cbs {
            registry.register(cb.clone());
        }
        registry.unregister(4, &cbs[3]);
        registry.unregister(2, &cbs[1]);
        assert_eq!(registry.register(echo()), 2);
        assert_eq!(registry.register(echo()), 4);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_log_slot_is_reserved() {
        let registry = CallbackRegistry::new();
        // application callbacks registered first never take the log slot
        let early = registry.register(echo());
        assert_ne!(early, LOG_CALLBACK_HANDLE);
        assert!(!registry.contains(LOG_CALLBACK_HANDLE));

        let log = echo();
        assert_eq!(registry.register_log(log.clone()), LOG_CALLBACK_HANDLE);
        assert_eq!(registry.dispatch(LOG_CALLBACK_HANDLE, "record").as_deref(), Some("record"));
        assert_eq!(registry.dispatch(early, "app").as_deref(), Some("app"));
        assert_eq!(registry.len(), 2);

        // releasing the log slot does not hand it to the next registration
        assert!(registry.unregister(LOG_CALLBACK_HANDLE, &log));
        assert_ne!(registry.register(echo()), LOG_CALLBACK_HANDLE);
    }

    #[test]
    fn test_register_log_replaces_previous_bridge() {
        struct Fixed(&'static str);
        impl LibEvmCallback for Fixed {
            fn invoke(&self, _args: &str) -> Option<String> {
                Some(self.0.to_string())
            }
        }

        let registry = CallbackRegistry::new();
        registry.register_log(Arc::new(Fixed("old")));
        registry.register_log(Arc::new(Fixed("new")));
        assert_eq!(registry.dispatch(LOG_CALLBACK_HANDLE, "").as_deref(), Some("new"));
        assert_eq!(registry.len(), 1);
    }

    // ── Unregister ──

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = CallbackRegistry::new();
        let cb = echo();
        let handle = registry.register(cb.clone());
        assert!(registry.unregister(handle, &cb));
        assert!(!registry.unregister(handle, &cb));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_mismatch_keeps_mapping() {
        let registry = CallbackRegistry::new();
        let owner = echo();
        let other = echo();
        let handle = registry.register(owner.clone());
        assert!(!registry.unregister(handle, &other));
        assert!(registry.contains(handle));
        assert_eq!(registry.dispatch(handle, "still here").as_deref(), Some("still here"));
    }

    // ── Dispatch ──

    #[test]
    fn test_dispatch_unknown_handle() {
        let registry = CallbackRegistry::new();
        assert_eq!(registry.dispatch(7, "{}"), None);
    }

    #[test]
    fn test_dispatch_contains_panic() {
        let registry = CallbackRegistry::new();
        let handle = registry.register(Arc::new(Panics));
        assert_eq!(registry.dispatch(handle, "{}"), None);
        // the registry stays usable after the panic
        let next = registry.register(echo());
        assert_eq!(registry.dispatch(next, "ok").as_deref(), Some("ok"));
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        struct Reenter(Arc<CallbackRegistry>);
        impl LibEvmCallback for Reenter {
            fn invoke(&self, args: &str) -> Option<String> {
                let inner = self.0.register(Arc::new(Echo));
                self.0.dispatch(inner, args)
            }
        }

        let registry = Arc::new(CallbackRegistry::new());
        let handle = registry.register(Arc::new(Reenter(registry.clone())));
        assert_eq!(registry.dispatch(handle, "nested").as_deref(), Some("nested"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(1u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
