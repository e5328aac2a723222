//! Resource handles: host proxies of native stateful objects.
//!
//! A resource is `Open` from the successful open call until it is closed,
//! either explicitly (errors returned) or on drop (errors logged). The
//! transition to `Closed` happens once. The host never checks handles
//! locally; calls with a stale handle value are rejected natively.

use std::fmt;
use std::marker::PhantomData;

use libevm_interop::Handle;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::gateway::LibEvm;

/// A kind of native resource and how to release it.
pub trait ResourceKind {
    /// Name used in logs.
    const NAME: &'static str;

    /// Issue the native close call for `handle`.
    fn release(libevm: &LibEvm, handle: Handle) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Open,
    Closed,
}

/// Owned handle to a native resource of kind `K`.
pub struct ResourceHandle<K: ResourceKind> {
    libevm: &'static LibEvm,
    handle: Handle,
    state: ResourceState,
    _kind: PhantomData<K>,
}

impl<K: ResourceKind> ResourceHandle<K> {
    /// Wrap a handle returned by a successful open call.
    pub(crate) fn opened(libevm: &'static LibEvm, handle: Handle) -> Self {
        debug!(kind = K::NAME, handle, "resource opened");
        Self {
            libevm,
            handle,
            state: ResourceState::Open,
            _kind: PhantomData,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub(crate) fn libevm(&self) -> &'static LibEvm {
        self.libevm
    }

    /// Close the resource, reporting native errors.
    pub fn close(mut self) -> Result<(), GatewayError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), GatewayError> {
        if self.state == ResourceState::Closed {
            return Ok(());
        }
        self.state = ResourceState::Closed;
        debug!(kind = K::NAME, handle = self.handle, "resource closed");
        K::release(self.libevm, self.handle)
    }
}

impl<K: ResourceKind> Drop for ResourceHandle<K> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                kind = K::NAME,
                handle = self.handle,
                error = %e,
                "failed to close resource on drop"
            );
        }
    }
}

impl<K: ResourceKind> fmt::Debug for ResourceHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &K::NAME)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}
