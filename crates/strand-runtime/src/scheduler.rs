//! Goroutine scheduler: a work-stealing worker pool executing JIT entry
//! points.
//!
//! Spawn sites in emitted code hand over a function reference (name,
//! direct pointer, or registry ID) plus fully-evaluated arguments; each
//! task resolves a promise with the function's return value. Workers steal
//! from a global injector and from each other.

use crossbeam_deque::{Injector, Stealer, Worker};
use once_cell::sync::Lazy;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::promise::Promise;
use crate::registry;
use crate::string::cstr_to_str;

/// A spawned goroutine: an entry pointer, its evaluated arguments, and the
/// promise observing its result.
struct GoTask {
    func_ptr: usize,
    args: Vec<i64>,
    promise: Arc<Promise>,
}

struct Scheduler {
    injector: Arc<Injector<GoTask>>,
    pending: Arc<AtomicUsize>,
}

static SCHEDULER: Lazy<Scheduler> = Lazy::new(|| {
    let injector: Arc<Injector<GoTask>> = Arc::new(Injector::new());
    let pending = Arc::new(AtomicUsize::new(0));

    let worker_count = num_cpus::get().clamp(2, 8);
    let workers: Vec<Worker<GoTask>> = (0..worker_count).map(|_| Worker::new_fifo()).collect();
    let stealers: Vec<Stealer<GoTask>> = workers.iter().map(|w| w.stealer()).collect();

    for (id, local) in workers.into_iter().enumerate() {
        let injector = injector.clone();
        let stealers = stealers.clone();
        let pending = pending.clone();
        thread::Builder::new()
            .name(format!("strand-worker-{}", id))
            .spawn(move || run_worker(local, injector, stealers, pending))
            .expect("failed to spawn worker thread");
    }

    Scheduler { injector, pending }
});

fn run_worker(
    local: Worker<GoTask>,
    injector: Arc<Injector<GoTask>>,
    stealers: Vec<Stealer<GoTask>>,
    pending: Arc<AtomicUsize>,
) {
    loop {
        let task = local.pop().or_else(|| {
            std::iter::repeat_with(|| {
                injector
                    .steal_batch_and_pop(&local)
                    .or_else(|| stealers.iter().map(|s| s.steal()).collect())
            })
            .find(|s| !s.is_retry())
            .and_then(|s| s.success())
        });

        match task {
            Some(task) => {
                let result = execute(task.func_ptr, &task.args);
                task.promise.resolve(result);
                pending.fetch_sub(1, Ordering::Release);
            }
            None => thread::sleep(Duration::from_micros(100)),
        }
    }
}

/// Invoke a JIT entry point with up to six integer arguments (SysV
/// convention; extra arguments are not supported by spawn sites).
fn execute(func_ptr: usize, args: &[i64]) -> i64 {
    if func_ptr == 0 {
        return 0;
    }
    // Safety: func_ptr was registered as a compiled entry point whose
    // prologue accepts the SysV integer-register arguments.
    unsafe {
        match args.len() {
            0 => std::mem::transmute::<usize, extern "C" fn() -> i64>(func_ptr)(),
            1 => std::mem::transmute::<usize, extern "C" fn(i64) -> i64>(func_ptr)(args[0]),
            2 => std::mem::transmute::<usize, extern "C" fn(i64, i64) -> i64>(func_ptr)(
                args[0], args[1],
            ),
            3 => std::mem::transmute::<usize, extern "C" fn(i64, i64, i64) -> i64>(func_ptr)(
                args[0], args[1], args[2],
            ),
            4 => std::mem::transmute::<usize, extern "C" fn(i64, i64, i64, i64) -> i64>(func_ptr)(
                args[0], args[1], args[2], args[3],
            ),
            5 => std::mem::transmute::<usize, extern "C" fn(i64, i64, i64, i64, i64) -> i64>(
                func_ptr,
            )(args[0], args[1], args[2], args[3], args[4]),
            _ => std::mem::transmute::<usize, extern "C" fn(i64, i64, i64, i64, i64, i64) -> i64>(
                func_ptr,
            )(args[0], args[1], args[2], args[3], args[4], args[5]),
        }
    }
}

/// Submit a task; returns the promise observing its result.
pub fn spawn_ptr(func_ptr: usize, args: Vec<i64>) -> Arc<Promise> {
    let promise = Promise::new();
    if func_ptr == 0 {
        // Unresolvable function reference: resolve immediately with 0 so
        // awaiting callers observe the null result and continue.
        promise.resolve(0);
        return promise;
    }
    SCHEDULER.pending.fetch_add(1, Ordering::Acquire);
    SCHEDULER.injector.push(GoTask {
        func_ptr,
        args,
        promise: promise.clone(),
    });
    promise
}

/// Number of tasks submitted but not yet finished.
pub fn pending_tasks() -> usize {
    SCHEDULER.pending.load(Ordering::Acquire)
}

fn spawn_named(name: &str, args: Vec<i64>) -> *mut Promise {
    let ptr = registry::lookup_by_name(name).unwrap_or(0);
    Promise::into_raw(spawn_ptr(ptr, args))
}

// ============================================================================
// C-callable spawn surface
// ============================================================================

/// # Safety
/// `function_name` must be null or NUL-terminated.
pub unsafe extern "C" fn goroutine_spawn(function_name: *const c_char) -> *mut Promise {
    spawn_named(cstr_to_str(function_name), Vec::new())
}

/// # Safety
/// `function_name` must be null or NUL-terminated.
pub unsafe extern "C" fn goroutine_spawn_with_arg1(
    function_name: *const c_char,
    arg1: i64,
) -> *mut Promise {
    spawn_named(cstr_to_str(function_name), vec![arg1])
}

/// # Safety
/// `function_name` must be null or NUL-terminated.
pub unsafe extern "C" fn goroutine_spawn_with_arg2(
    function_name: *const c_char,
    arg1: i64,
    arg2: i64,
) -> *mut Promise {
    spawn_named(cstr_to_str(function_name), vec![arg1, arg2])
}

/// Spawn with an argument array built on the caller's stack.
///
/// # Safety
/// `function_name` must be NUL-terminated; `args` must point at
/// `arg_count` readable i64 values.
pub unsafe extern "C" fn goroutine_spawn_with_args(
    function_name: *const c_char,
    args: *const i64,
    arg_count: i64,
) -> *mut Promise {
    let args = if args.is_null() || arg_count <= 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(args, arg_count.min(6) as usize).to_vec()
    };
    spawn_named(cstr_to_str(function_name), args)
}

/// Spawn by direct function pointer, optionally with one argument.
pub extern "C" fn goroutine_spawn_func_ptr(func_ptr: usize, arg: i64) -> *mut Promise {
    let args = if arg == 0 { Vec::new() } else { vec![arg] };
    Promise::into_raw(spawn_ptr(func_ptr, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn fixed_answer() -> i64 {
        41
    }

    extern "C" fn add_two(a: i64, b: i64) -> i64 {
        a + b
    }

    #[test]
    fn test_spawn_ptr_runs_and_resolves() {
        let p = spawn_ptr(fixed_answer as usize, Vec::new());
        assert_eq!(p.wait(), 41);
    }

    #[test]
    fn test_spawn_with_args() {
        let p = spawn_ptr(add_two as usize, vec![19, 23]);
        assert_eq!(p.wait(), 42);
    }

    #[test]
    fn test_spawn_named_function() {
        registry::register_named("sched_test_fn", fixed_answer as usize);
        let name = std::ffi::CString::new("sched_test_fn").unwrap();
        unsafe {
            let p = goroutine_spawn(name.as_ptr());
            assert_eq!(promise_ref(p).wait(), 41);
        }
    }

    #[test]
    fn test_spawn_unknown_name_resolves_null() {
        let name = std::ffi::CString::new("sched_missing_fn").unwrap();
        unsafe {
            let p = goroutine_spawn(name.as_ptr());
            assert_eq!(promise_ref(p).wait(), 0);
        }
    }

    unsafe fn promise_ref<'a>(p: *mut Promise) -> &'a Promise {
        &*p
    }
}
