//! Counting semaphore for resource-count-based synchronization.
//!
//! Built on [`super::mutex::Mutex`] and [`super::condvar::Condvar`] so it
//! gets the same std/no_std dual backend as the rest of this module.

use super::condvar::Condvar;
use super::mutex::Mutex;
use crate::clock::{self, Ticks};
use crate::status::Status;

pub struct Semaphore {
    count: Mutex<i32>,
    condvar: Condvar,
}

impl Semaphore {
    /// Create a new semaphore with the given initial count.
    pub const fn new(initial: i32) -> Self {
        Semaphore {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    /// Decrement (wait/P operation), blocking until the count is positive.
    pub fn wait(&self) {
        let mut guard = self.count.lock();
        loop {
            if *guard > 0 {
                *guard -= 1;
                return;
            }
            let (g, _status) = self.condvar.wait_until(guard, clock::NO_TIMEOUT);
            guard = g;
        }
    }

    /// Decrement with a tick-based timeout. `Status::TimedOut` if the
    /// deadline is reached before the count becomes positive.
    pub fn wait_timeout(&self, timeout: Ticks) -> Status {
        let deadline = clock::deadline(timeout);
        let mut guard = self.count.lock();
        loop {
            if *guard > 0 {
                *guard -= 1;
                return Status::Ok;
            }
            let (g, status) = self.condvar.wait_until(guard, deadline);
            guard = g;
            if status == Status::TimedOut && *guard <= 0 {
                return Status::TimedOut;
            }
        }
    }

    /// Increment (signal/V operation). Wakes one waiter.
    pub fn signal(&self) {
        *self.count.lock() += 1;
        self.condvar.notify_one();
    }

    /// Try to decrement the semaphore without blocking.
    pub fn try_wait(&self) -> bool {
        let mut guard = self.count.lock();
        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn wait_blocks_until_signal() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = std::thread::spawn(move || {
            sem2.wait();
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        sem.signal();
        handle.join().unwrap();
    }

    #[test]
    fn try_wait_respects_count() {
        let sem = Semaphore::new(1);
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.signal();
        assert!(sem.try_wait());
    }
}
