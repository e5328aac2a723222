//! Native object tables.
//!
//! Handles start at 1 and increase, wrapping around at `i32::MAX` and
//! skipping handles still in use. Each category (stores, views, tracers)
//! has its own table.

use std::collections::HashMap;

use libevm_interop::Handle;
use parking_lot::RwLock;

use crate::error::{StubError, StubResult};

pub struct Handles<T> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    current: Handle,
    used: HashMap<Handle, T>,
}

impl<T: Clone> Handles<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: 0,
                used: HashMap::new(),
            }),
        }
    }

    pub fn add(&self, obj: T) -> Handle {
        let mut inner = self.inner.write();
        loop {
            if inner.current == Handle::MAX {
                inner.current = 0;
            }
            inner.current += 1;
            let handle = inner.current;
            if let std::collections::hash_map::Entry::Vacant(slot) = inner.used.entry(handle) {
                slot.insert(obj);
                return handle;
            }
        }
    }

    pub fn get(&self, handle: Handle) -> StubResult<T> {
        self.inner
            .read()
            .used
            .get(&handle)
            .cloned()
            .ok_or(StubError::InvalidHandle(handle))
    }

    pub fn remove(&self, handle: Handle) -> StubResult<T> {
        self.inner
            .write()
            .used
            .remove(&handle)
            .ok_or(StubError::InvalidHandle(handle))
    }

    pub fn len(&self) -> usize {
        self.inner.read().used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Handles<T> {
    fn default() -> Self {
        Self::new()
    }
}
