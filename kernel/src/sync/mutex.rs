//! Sleeping mutex that blocks the calling thread instead of spinning.
//!
//! Under `std` (real tests, or the `posix` crate linking with `features =
//! ["std"]`) this is backed by [`std::sync::Mutex`], giving genuine blocking
//! and real thread scheduling. Without `std` there is no scheduler to block
//! on yet, so the lock degrades to a bounded spin over [`Spinlock`]; a real
//! embedder is expected to replace this with a scheduler-integrated wait
//! queue, the same gap the teacher's own mutex left as a Phase 2 TODO.

#[cfg(not(any(test, feature = "std")))]
use crate::sync::spinlock::Spinlock;
#[cfg(not(any(test, feature = "std")))]
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

#[cfg(any(test, feature = "std"))]
pub struct Mutex<T> {
    inner: std::sync::Mutex<T>,
}

#[cfg(any(test, feature = "std"))]
pub struct MutexGuard<'a, T> {
    inner: std::sync::MutexGuard<'a, T>,
}

#[cfg(any(test, feature = "std"))]
impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Mutex {
            inner: std::sync::Mutex::new(data),
        }
    }

    /// Acquire the mutex, blocking until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard {
            inner: self.inner.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Try to acquire the mutex without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner
            .try_lock()
            .ok()
            .map(|inner| MutexGuard { inner })
    }
}

#[cfg(any(test, feature = "std"))]
impl<'a, T> MutexGuard<'a, T> {
    pub(super) fn into_std(self) -> std::sync::MutexGuard<'a, T> {
        self.inner
    }

    pub(super) fn from_std(inner: std::sync::MutexGuard<'a, T>) -> Self {
        MutexGuard { inner }
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(not(any(test, feature = "std")))]
pub struct Mutex<T> {
    inner: Spinlock<MutexInner>,
    data: UnsafeCell<T>,
}

#[cfg(not(any(test, feature = "std")))]
struct MutexInner {
    locked: bool,
}

#[cfg(not(any(test, feature = "std")))]
unsafe impl<T: Send> Sync for Mutex<T> {}
#[cfg(not(any(test, feature = "std")))]
unsafe impl<T: Send> Send for Mutex<T> {}

#[cfg(not(any(test, feature = "std")))]
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

#[cfg(not(any(test, feature = "std")))]
impl<'a, T> MutexGuard<'a, T> {
    pub(super) fn mutex_ref(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Mutex {
            inner: Spinlock::new(MutexInner { locked: false }),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the mutex, spinning until it becomes available. A real
    /// embedder should replace this with a scheduler-aware wait queue (see
    /// [`crate::task::WaitQueue`] for the equivalent used by process/thread
    /// blocking primitives).
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            {
                let mut inner = self.inner.lock();
                if !inner.locked {
                    inner.locked = true;
                    return MutexGuard { mutex: self };
                }
            }
            core::hint::spin_loop();
        }
    }

    /// Try to acquire the mutex without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut inner = self.inner.lock();
        if !inner.locked {
            inner.locked = true;
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.inner.lock().locked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn mutual_exclusion() {
        let mutex = Arc::new(Mutex::new(0u32));
        let mut handles = alloc::vec::Vec::new();
        for _ in 0..8 {
            let mutex = Arc::clone(&mutex);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    *mutex.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*mutex.lock(), 8000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(1);
        let guard = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }
}
