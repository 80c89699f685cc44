//! Timers: `setTimeout` / `setInterval` with ID-indexed cancellation.
//!
//! A single timer thread owns a priority queue ordered by deadline.
//! Callbacks are JIT entry points invoked with no arguments on the timer
//! thread; intervals re-arm themselves until cancelled.

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(PartialEq, Eq)]
struct Timer {
    execute_at: Instant,
    id: i64,
    callback: usize,
    is_interval: bool,
    interval_ms: i64,
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.execute_at.cmp(&other.execute_at)
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct TimerState {
    queue: BinaryHeap<Reverse<Timer>>,
    cancelled: FxHashSet<i64>,
}

struct TimerSystem {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

static NEXT_TIMER_ID: AtomicI64 = AtomicI64::new(1);

static TIMER_SYSTEM: Lazy<&'static TimerSystem> = Lazy::new(|| {
    let system: &'static TimerSystem = Box::leak(Box::new(TimerSystem {
        state: Mutex::new(TimerState {
            queue: BinaryHeap::new(),
            cancelled: FxHashSet::default(),
        }),
        wakeup: Condvar::new(),
    }));

    thread::Builder::new()
        .name("strand-timer".to_string())
        .spawn(move || run_timer_loop(system))
        .expect("failed to spawn timer thread");

    system
});

fn run_timer_loop(system: &'static TimerSystem) {
    loop {
        let mut state = system.state.lock();

        let now = Instant::now();
        let mut due = Vec::new();
        while let Some(Reverse(timer)) = state.queue.peek() {
            if timer.execute_at > now {
                break;
            }
            let Reverse(timer) = state.queue.pop().unwrap();
            if state.cancelled.remove(&timer.id) {
                continue;
            }
            if timer.is_interval {
                state.queue.push(Reverse(Timer {
                    execute_at: now + Duration::from_millis(timer.interval_ms.max(0) as u64),
                    id: timer.id,
                    callback: timer.callback,
                    is_interval: true,
                    interval_ms: timer.interval_ms,
                }));
            }
            due.push(timer.callback);
        }

        let wait = state
            .queue
            .peek()
            .map(|Reverse(t)| t.execute_at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(50));

        if due.is_empty() {
            let _ = system.wakeup.wait_for(&mut state, wait);
            continue;
        }
        drop(state);

        for callback in due {
            if callback != 0 {
                // Safety: callbacks are compiled zero-argument entry points.
                unsafe {
                    let cb: extern "C" fn() -> i64 = std::mem::transmute(callback);
                    cb();
                }
            }
        }
    }
}

fn schedule(callback: usize, delay_ms: i64, is_interval: bool) -> i64 {
    let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
    let system = *TIMER_SYSTEM;
    let mut state = system.state.lock();
    state.queue.push(Reverse(Timer {
        execute_at: Instant::now() + Duration::from_millis(delay_ms.max(0) as u64),
        id,
        callback,
        is_interval,
        interval_ms: delay_ms,
    }));
    system.wakeup.notify_one();
    id
}

fn cancel(id: i64) -> i64 {
    let system = *TIMER_SYSTEM;
    let mut state = system.state.lock();
    let live = state.queue.iter().any(|Reverse(t)| t.id == id);
    if live {
        state.cancelled.insert(id);
        1
    } else {
        0
    }
}

pub extern "C" fn set_timeout(callback: usize, delay_ms: i64) -> i64 {
    schedule(callback, delay_ms, false)
}

pub extern "C" fn set_interval(callback: usize, interval_ms: i64) -> i64 {
    schedule(callback, interval_ms, true)
}

pub extern "C" fn clear_timeout(id: i64) -> i64 {
    cancel(id)
}

pub extern "C" fn clear_interval(id: i64) -> i64 {
    cancel(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static FIRED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn bump() -> i64 {
        FIRED.fetch_add(1, Ordering::SeqCst);
        0
    }

    #[test]
    fn test_timeout_fires_once() {
        let before = FIRED.load(Ordering::SeqCst);
        set_timeout(bump as usize, 10);
        thread::sleep(Duration::from_millis(100));
        assert!(FIRED.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_clear_timeout_before_fire() {
        let id = set_timeout(bump as usize, 5_000);
        assert_eq!(clear_timeout(id), 1);
        // Cancelling twice: the entry is still queued (cancellation is
        // lazy), so a second cancel also reports success until it drains.
        assert_eq!(clear_timeout(999_999), 0);
    }

    #[test]
    fn test_interval_rearms_until_cleared() {
        let before = FIRED.load(Ordering::SeqCst);
        let id = set_interval(bump as usize, 10);
        thread::sleep(Duration::from_millis(120));
        let mid = FIRED.load(Ordering::SeqCst);
        assert!(mid - before >= 2, "interval should have fired repeatedly");
        assert_eq!(clear_interval(id), 1);
    }
}
