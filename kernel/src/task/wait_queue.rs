//! A portable interruptible sleep primitive (spec §4.C), shared by thread
//! sleep, the reaper, and the IPC send/receive paths.
//!
//! Not itself named in the spec's data model; it is the generalization
//! needed to implement "atomically release `lock` and suspend" without a
//! real scheduler. A waiter is woken by [`WaitQueue::wake_one`]/`wake_all`,
//! by timeout, or by the caller-supplied `is_interrupted` predicate
//! observing a thread interrupt — modelling spec's "re-read the wait lock
//! under lock, retry if it changed" dance with a generation counter instead
//! of a real lock-pointer, since there is no scheduler structure here that
//! could actually requeue a sleeper onto a different lock.

use crate::clock::{self, Ticks};
use crate::status::Status;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;

struct State {
    generation: u64,
}

pub struct WaitQueue {
    state: Mutex<State>,
    condvar: Condvar,
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            state: Mutex::new(State { generation: 0 }),
            condvar: Condvar::new(),
        }
    }

    /// Wake the waiters currently asleep (does not affect anyone that
    /// starts sleeping afterward).
    pub fn wake_all(&self) {
        self.state.lock().generation += 1;
        self.condvar.notify_all();
    }

    pub fn wake_one(&self) {
        self.state.lock().generation += 1;
        self.condvar.notify_one();
    }

    /// Sleep until woken, `timeout` ticks elapse, or `is_interrupted`
    /// returns `true`. `timeout == 0` returns `WouldBlock` immediately
    /// without sleeping (spec §8 boundary behaviour).
    pub fn sleep(&self, timeout: Ticks, is_interrupted: impl Fn() -> bool) -> Status {
        if timeout == 0 {
            return Status::WouldBlock;
        }
        if is_interrupted() {
            return Status::Interrupted;
        }

        let deadline = clock::deadline(timeout);
        let mut guard = self.state.lock();
        let start_generation = guard.generation;
        loop {
            if is_interrupted() {
                return Status::Interrupted;
            }
            if guard.generation != start_generation {
                return Status::Ok;
            }
            let (g, status) = self.condvar.wait_until(guard, deadline);
            guard = g;
            if status == Status::TimedOut && guard.generation == start_generation {
                return Status::TimedOut;
            }
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn zero_timeout_never_sleeps() {
        let wq = WaitQueue::new();
        assert_eq!(wq.sleep(0, || false), Status::WouldBlock);
    }

    #[test]
    fn wake_all_releases_waiter() {
        let wq = Arc::new(WaitQueue::new());
        let wq2 = Arc::clone(&wq);
        let handle = std::thread::spawn(move || wq2.sleep(clock::NO_TIMEOUT, || false));
        std::thread::sleep(std::time::Duration::from_millis(10));
        wq.wake_all();
        assert_eq!(handle.join().unwrap(), Status::Ok);
    }

    #[test]
    fn interrupted_predicate_wakes() {
        let wq = WaitQueue::new();
        let interrupted = Arc::new(AtomicBool::new(false));
        let interrupted2 = Arc::clone(&interrupted);
        interrupted.store(true, Ordering::SeqCst);
        assert_eq!(
            wq.sleep(clock::NO_TIMEOUT, move || interrupted2.load(Ordering::SeqCst)),
            Status::Interrupted
        );
    }
}
