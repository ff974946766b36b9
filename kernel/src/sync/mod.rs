//! Synchronization primitives for the kernel.
//!
//! Provides a busy-wait [`spinlock::Spinlock`] for IRQ-safe short critical
//! sections, a blocking [`mutex::Mutex`] and [`rwlock::RwLock`], a
//! [`condvar::Condvar`] for interruptible sleep, a counting
//! [`semaphore::Semaphore`], a one-shot [`notifier::Notifier`] for the
//! handle wait/unwait contract, and a tick-driven [`timer::Timer`].

pub mod condvar;
pub mod mutex;
pub mod notifier;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;
pub mod timer;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
pub use notifier::{Notifier, NotifierToken};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use timer::{Timer, TimerWheel};
