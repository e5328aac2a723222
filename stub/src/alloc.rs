//! Buffer allocator behind `CreateBuffer` / `FreeBuffer`, with a ledger.
//!
//! Buffers come from `calloc` and go back through `free`. Every live buffer
//! is tracked, so a release of an unknown or already released pointer is
//! counted as an invalid free instead of corrupting the heap.
//!
//! Counters are per thread: a boundary call and all callbacks it triggers
//! run on the caller's thread, so a test sees exactly its own traffic.

use std::cell::Cell;
use std::collections::HashMap;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static LIVE: Lazy<Mutex<HashMap<usize, usize>>> = Lazy::new(|| Mutex::new(HashMap::new()));

thread_local! {
    static STATS: Cell<AllocStats> = const { Cell::new(AllocStats::ZERO) };
    static FAIL_NEXT: Cell<u32> = const { Cell::new(0) };
}

/// Allocation counters of the current thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocated: u64,
    pub freed: u64,
    pub invalid_frees: u64,
    pub failed: u64,
}

impl AllocStats {
    const ZERO: AllocStats = AllocStats {
        allocated: 0,
        freed: 0,
        invalid_frees: 0,
        failed: 0,
    };

    /// Counters accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &AllocStats) -> AllocStats {
        AllocStats {
            allocated: self.allocated - earlier.allocated,
            freed: self.freed - earlier.freed,
            invalid_frees: self.invalid_frees - earlier.invalid_frees,
            failed: self.failed - earlier.failed,
        }
    }

    /// Allocations not yet released.
    pub fn outstanding(&self) -> i64 {
        self.allocated as i64 - self.freed as i64
    }
}

fn record(update: impl FnOnce(&mut AllocStats)) {
    STATS.with(|cell| {
        let mut stats = cell.get();
        update(&mut stats);
        cell.set(stats);
    });
}

pub fn stats() -> AllocStats {
    STATS.with(Cell::get)
}

/// Make the next `n` allocations on this thread fail.
pub fn fail_next_allocations(n: u32) {
    FAIL_NEXT.with(|cell| cell.set(n));
}

/// Number of live buffers across all threads.
pub fn live_buffers() -> usize {
    LIVE.lock().len()
}

/// Size of a live buffer, `None` for unknown pointers.
pub fn buffer_len(ptr: *const c_void) -> Option<usize> {
    LIVE.lock().get(&(ptr as usize)).copied()
}

/// Allocate a zero-initialized buffer, or null.
pub fn create_buffer(size: c_int) -> *mut c_void {
    let injected = FAIL_NEXT.with(|cell| {
        let n = cell.get();
        if n > 0 {
            cell.set(n - 1);
        }
        n > 0
    });
    if injected || size <= 0 {
        record(|s| s.failed += 1);
        return ptr::null_mut();
    }
    // SAFETY: calloc with a positive size; null is handled below.
    let buffer = unsafe { libc::calloc(size as usize, 1) };
    if buffer.is_null() {
        record(|s| s.failed += 1);
        return ptr::null_mut();
    }
    LIVE.lock().insert(buffer as usize, size as usize);
    record(|s| s.allocated += 1);
    buffer
}

/// Release a buffer from [`create_buffer`]. Null is ignored.
///
/// # Safety
/// A live `ptr` must not be in use after this call.
pub unsafe fn free_buffer(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    if LIVE.lock().remove(&(ptr as usize)).is_none() {
        record(|s| s.invalid_frees += 1);
        return;
    }
    libc::free(ptr);
    record(|s| s.freed += 1);
}

/// Copy `bytes` into a new NUL-terminated buffer, or null.
pub fn allocate_bytes(bytes: &[u8]) -> *mut c_char {
    let Ok(size) = c_int::try_from(bytes.len() + 1) else {
        return ptr::null_mut();
    };
    let buffer = create_buffer(size) as *mut u8;
    if !buffer.is_null() {
        // SAFETY: the buffer holds len + 1 zeroed bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len()) };
    }
    buffer as *mut c_char
}

pub fn allocate_string(s: &str) -> *mut c_char {
    allocate_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_allocate_and_free() {
        let before = stats();
        let ptr = allocate_string("hello");
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "hello");
        assert_eq!(buffer_len(ptr as *const c_void), Some(6));
        unsafe { free_buffer(ptr as *mut c_void) };
        let delta = stats().since(&before);
        assert_eq!(delta.allocated, 1);
        assert_eq!(delta.freed, 1);
        assert_eq!(delta.outstanding(), 0);
    }

    #[test]
    fn test_double_free_is_recorded() {
        let before = stats();
        let ptr = create_buffer(8);
        unsafe {
            free_buffer(ptr);
            free_buffer(ptr);
        }
        let delta = stats().since(&before);
        assert_eq!(delta.freed, 1);
        assert_eq!(delta.invalid_frees, 1);
    }

    #[test]
    fn test_foreign_pointer_not_freed() {
        let before = stats();
        let mut local = 0u64;
        unsafe { free_buffer(&mut local as *mut u64 as *mut c_void) };
        assert_eq!(stats().since(&before).invalid_frees, 1);
    }

    #[test]
    fn test_injected_failure() {
        let before = stats();
        fail_next_allocations(2);
        assert!(create_buffer(4).is_null());
        assert!(allocate_string("x").is_null());
        let ptr = create_buffer(4);
        assert!(!ptr.is_null());
        unsafe { free_buffer(ptr) };
        let delta = stats().since(&before);
        assert_eq!(delta.failed, 2);
        assert_eq!(delta.allocated, 1);
    }

    #[test]
    fn test_zero_initialized() {
        let ptr = create_buffer(16) as *mut u8;
        let bytes = unsafe { std::slice::from_raw_parts(ptr, 16) };
        assert!(bytes.iter().all(|b| *b == 0));
        unsafe { free_buffer(ptr as *mut c_void) };
    }

    #[test]
    fn test_null_free_ignored() {
        let before = stats();
        unsafe { free_buffer(ptr::null_mut()) };
        assert_eq!(stats().since(&before), AllocStats::default());
    }
}
