//! Promises: single-assignment value cells with blocking await.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::array::{self, Array};

/// A single-assignment value cell. `resolve` wins once; later calls are
/// ignored. `wait` blocks the calling thread until resolution.
pub struct Promise {
    state: Mutex<Option<i64>>,
    cond: Condvar,
}

impl Promise {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    pub fn resolve(&self, value: i64) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(value);
            self.cond.notify_all();
        }
    }

    pub fn wait(&self) -> i64 {
        let mut state = self.state.lock();
        while state.is_none() {
            self.cond.wait(&mut state);
        }
        state.unwrap()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Leak an Arc reference into a raw pointer for emitted code. The
    /// runtime never reclaims these; goroutine results may be awaited at
    /// any point in the process lifetime.
    pub fn into_raw(this: Arc<Self>) -> *mut Promise {
        Arc::into_raw(this) as *mut Promise
    }
}

/// # Safety
/// `promise` must be null or a pointer from `Promise::into_raw`.
pub unsafe extern "C" fn promise_await(promise: *mut Promise) -> i64 {
    match promise.as_ref() {
        Some(p) => p.wait(),
        None => 0,
    }
}

/// # Safety
/// `promise` must be null or a pointer from `Promise::into_raw`.
pub unsafe extern "C" fn promise_resolve(promise: *mut Promise, value: i64) {
    if let Some(p) = promise.as_ref() {
        p.resolve(value);
    }
}

/// Await every promise in a legacy array (stored as pointers) and return a
/// new array of their results, in order.
///
/// # Safety
/// `promises` must be null or a legacy array of promise pointers.
pub unsafe extern "C" fn promise_all(promises: *mut Array) -> *mut Array {
    let results = array::array_create(0);
    if let Some(arr) = promises.as_ref() {
        for &entry in &arr.data {
            let value = promise_await(entry as *mut Promise);
            array::array_push(results, value);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_resolve_then_wait() {
        let p = Promise::new();
        p.resolve(42);
        assert_eq!(p.wait(), 42);
    }

    #[test]
    fn test_first_resolution_wins() {
        let p = Promise::new();
        p.resolve(1);
        p.resolve(2);
        assert_eq!(p.wait(), 1);
    }

    #[test]
    fn test_wait_blocks_until_resolved() {
        let p = Promise::new();
        let clone = p.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            clone.resolve(7);
        });
        assert_eq!(p.wait(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn test_promise_all_collects_in_order() {
        unsafe {
            let arr = array::array_create(0);
            for v in [10, 20, 30] {
                let p = Promise::new();
                p.resolve(v);
                array::array_push(arr, Promise::into_raw(p) as i64);
            }
            let results = promise_all(arr);
            assert_eq!((*results).data, vec![10, 20, 30]);
        }
    }

    #[test]
    fn test_null_promise_awaits_to_zero() {
        unsafe {
            assert_eq!(promise_await(std::ptr::null_mut()), 0);
        }
    }
}
