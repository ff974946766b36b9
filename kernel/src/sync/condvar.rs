//! Condition variable used to implement interruptible sleep (spec §5).
//!
//! Under `std` this wraps [`std::sync::Condvar`] directly against a
//! [`super::mutex::MutexGuard`]'s inner lock. Without `std` there is no
//! thread to suspend, so `wait`/`wait_timeout` degrade to a bounded spin
//! driven by [`crate::clock`], matching the tick-based timeout model used
//! throughout this crate.

use crate::clock::{self, Ticks};
use crate::status::Status;

#[cfg(any(test, feature = "std"))]
pub struct Condvar {
    inner: std::sync::Condvar,
}

#[cfg(any(test, feature = "std"))]
impl Condvar {
    pub const fn new() -> Self {
        Condvar {
            inner: std::sync::Condvar::new(),
        }
    }

    /// Wait until notified or `deadline` (absolute tick count) passes.
    /// Returns `Status::TimedOut` if the deadline elapsed first.
    pub fn wait_until<'a, T>(
        &self,
        guard: super::mutex::MutexGuard<'a, T>,
        deadline: Ticks,
    ) -> (super::mutex::MutexGuard<'a, T>, Status) {
        if deadline == clock::NO_TIMEOUT {
            let inner = self
                .inner
                .wait(guard.into_std())
                .unwrap_or_else(|e| e.into_inner());
            return (super::mutex::MutexGuard::from_std(inner), Status::Ok);
        }

        let now = clock::now();
        let remaining = deadline.saturating_sub(now);
        let timeout = clock::TICK_DURATION * remaining as u32;
        let (inner, result) = self
            .inner
            .wait_timeout(guard.into_std(), timeout)
            .unwrap_or_else(|e| e.into_inner());
        let status = if result.timed_out() {
            Status::TimedOut
        } else {
            Status::Ok
        };
        (super::mutex::MutexGuard::from_std(inner), status)
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    /// Wake all waiters.
    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}

#[cfg(not(any(test, feature = "std")))]
pub struct Condvar;

#[cfg(not(any(test, feature = "std")))]
impl Condvar {
    pub const fn new() -> Self {
        Condvar
    }

    /// Release `guard`, spin-poll until `deadline`, then reacquire. The
    /// caller is responsible for re-checking its wake condition after this
    /// returns, the same as a real condvar under spurious wakeup.
    pub fn wait_until<'a, T>(
        &self,
        guard: super::mutex::MutexGuard<'a, T>,
        deadline: Ticks,
    ) -> (super::mutex::MutexGuard<'a, T>, Status) {
        let mutex = guard.mutex_ref();
        drop(guard);
        loop {
            if deadline != clock::NO_TIMEOUT && clock::now() >= deadline {
                return (mutex.lock(), Status::TimedOut);
            }
            core::hint::spin_loop();
            return (mutex.lock(), Status::Ok);
        }
    }

    pub fn notify_one(&self) {}
    pub fn notify_all(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::mutex::Mutex;
    use alloc::sync::Arc;

    #[test]
    fn notify_wakes_waiter() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);

        let handle = std::thread::spawn(move || {
            let (mutex, condvar) = &*pair2;
            let mut guard = mutex.lock();
            while !*guard {
                let (g, status) = condvar.wait_until(guard, clock::NO_TIMEOUT);
                assert_eq!(status, Status::Ok);
                guard = g;
            }
        });

        std::thread::sleep(std::time::Duration::from_millis(10));
        let (mutex, condvar) = &*pair;
        *mutex.lock() = true;
        condvar.notify_all();
        handle.join().unwrap();
    }

    #[test]
    fn wait_until_times_out() {
        let mutex = Mutex::new(());
        let condvar = Condvar::new();
        let deadline = clock::now();
        let (_guard, status) = condvar.wait_until(mutex.lock(), deadline);
        assert_eq!(status, Status::TimedOut);
    }
}
