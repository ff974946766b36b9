//! Monotonic tick counter used for timeouts, timers, and message timestamps.
//!
//! The kernel has no notion of wall-clock time of its own: a single global
//! tick count is advanced by whatever drives the system (a PIT/APIC timer
//! IRQ on real hardware, or [`advance`] called directly in tests). Timeouts
//! throughout this crate are expressed in ticks rather than a `Duration`,
//! mirroring the teacher's own `wake_at_tick: Option<u32>` field on `Thread`.

use core::sync::atomic::{AtomicU64, Ordering};

/// A point in time or a duration, measured in ticks since boot.
pub type Ticks = u64;

/// Sentinel meaning "wait forever" when passed as a timeout.
pub const NO_TIMEOUT: Ticks = u64::MAX;

/// Wall-clock duration represented by one tick, used only by the `std`
/// blocking backend to convert a tick-based timeout into a real
/// `Duration` it can hand to `std::sync::Condvar::wait_timeout`.
#[cfg(any(test, feature = "std"))]
pub const TICK_DURATION: core::time::Duration = core::time::Duration::from_millis(1);

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Current tick count.
pub fn now() -> Ticks {
    TICKS.load(Ordering::Acquire)
}

/// Advance the tick count by `n` and return the new value. Called once per
/// timer interrupt on real hardware; called directly by tests to simulate
/// the passage of time without a real timer source.
pub fn advance(n: u64) -> Ticks {
    TICKS.fetch_add(n, Ordering::AcqRel) + n
}

/// Compute an absolute deadline `timeout` ticks from now. `NO_TIMEOUT`
/// propagates unchanged.
pub fn deadline(timeout: Ticks) -> Ticks {
    if timeout == NO_TIMEOUT {
        NO_TIMEOUT
    } else {
        now().saturating_add(timeout)
    }
}

/// Spawn a background thread that advances the tick counter once per
/// `TICK_DURATION`, so tests written against a real wall clock (e.g. an
/// `ALARM(1)` firing after real elapsed time) observe ticks advancing
/// without manually calling [`advance`].
#[cfg(any(test, feature = "std"))]
pub fn spawn_ticker() -> std::thread::JoinHandle<()> {
    std::thread::spawn(|| loop {
        std::thread::sleep(TICK_DURATION);
        advance(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `TICKS` is one process-wide counter; serialize tests that rely on its
    // exact value so they don't observe each other's `advance()` calls.
    static CLOCK_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn advance_is_monotonic() {
        let _guard = CLOCK_TEST_LOCK.lock().unwrap();
        let a = now();
        let b = advance(5);
        assert_eq!(b, a + 5);
        assert_eq!(now(), b);
    }

    #[test]
    fn deadline_saturates_no_timeout() {
        assert_eq!(deadline(NO_TIMEOUT), NO_TIMEOUT);
    }

    #[test]
    fn deadline_is_relative_to_now() {
        let _guard = CLOCK_TEST_LOCK.lock().unwrap();
        let base = now();
        assert_eq!(deadline(10), base + 10);
    }
}
