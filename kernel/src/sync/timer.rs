//! A one-shot, tick-driven timer.
//!
//! Used for thread-sleep timeouts and the POSIX `alarm()` facility (spec
//! §4.E). A `Timer` fires its [`Notifier`] when the current tick reaches its
//! deadline; something external (the `std` ticker thread in tests, a real
//! timer interrupt on hardware) must drive expiry checks by calling
//! [`Timer::check`] or the system-wide [`check_all`] sweep.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::clock::{self, Ticks};
use crate::handle::{KernelObject, ObjectType};
use crate::sync::notifier::Notifier;
use crate::sync::spinlock::Spinlock;

const INACTIVE: Ticks = 0;

/// A single-shot countdown, rearmed by calling [`Timer::set`] again.
pub struct Timer {
    deadline: AtomicU64,
    notifier: Notifier,
}

impl Timer {
    pub const fn new() -> Self {
        Timer {
            deadline: AtomicU64::new(INACTIVE),
            notifier: Notifier::new(),
        }
    }

    /// Arm the timer to fire `ticks` from now. `0` disarms it (matching
    /// `alarm(0)`'s "cancel any pending alarm" semantics) and returns the
    /// number of ticks that were remaining on the previous deadline, or `0`
    /// if it was not armed.
    pub fn set(&self, ticks: Ticks) -> Ticks {
        let previous = self.deadline.swap(
            if ticks == 0 {
                INACTIVE
            } else {
                clock::deadline(ticks)
            },
            Ordering::AcqRel,
        );
        if previous == INACTIVE {
            0
        } else {
            previous.saturating_sub(clock::now())
        }
    }

    /// `true` if armed and its deadline has passed; fires the notifier and
    /// disarms exactly once.
    pub fn check(&self) -> bool {
        let deadline = self.deadline.load(Ordering::Acquire);
        if deadline == INACTIVE || clock::now() < deadline {
            return false;
        }
        if self
            .deadline
            .compare_exchange(deadline, INACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.notifier.fire();
            true
        } else {
            false
        }
    }

    /// Register a callback to run when this timer next fires.
    pub fn on_fire(&self, callback: alloc::boxed::Box<dyn FnOnce() + Send>) {
        self.notifier.register(callback);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.load(Ordering::Acquire) != INACTIVE
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelObject for Timer {
    fn object_type(&self) -> ObjectType {
        ObjectType::Timer
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// System-wide registry of active timers, swept once per tick by whatever
/// drives [`crate::clock::advance`].
pub struct TimerWheel {
    timers: Spinlock<Vec<Arc<Timer>>>,
}

impl TimerWheel {
    pub const fn new() -> Self {
        TimerWheel {
            timers: Spinlock::new(Vec::new()),
        }
    }

    pub fn track(&self, timer: Arc<Timer>) {
        self.timers.lock().push(timer);
    }

    /// Check every tracked timer, dropping ones that are no longer armed and
    /// have no other owner.
    pub fn check_all(&self) {
        let mut timers = self.timers.lock();
        for timer in timers.iter() {
            timer.check();
        }
        timers.retain(|t| Arc::strong_count(t) > 1 || t.is_armed());
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicBool;

    #[test]
    fn fires_after_deadline() {
        let timer = Timer::new();
        timer.set(5);
        assert!(!timer.check());
        clock::advance(5);
        assert!(timer.check());
        assert!(!timer.is_armed());
    }

    #[test]
    fn zero_disarms() {
        let timer = Timer::new();
        timer.set(10);
        let remaining = timer.set(0);
        assert!(remaining > 0);
        assert!(!timer.is_armed());
    }

    #[test]
    fn callback_runs_on_fire() {
        let timer = Timer::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        timer.on_fire(alloc::boxed::Box::new(move || {
            fired2.store(true, Ordering::SeqCst);
        }));
        timer.set(1);
        clock::advance(1);
        timer.check();
        assert!(fired.load(Ordering::SeqCst));
    }
}
