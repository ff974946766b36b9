//! Reader-writer lock, used by the device tree and handle table where reads
//! vastly outnumber writes (spec §4.B/§6).
//!
//! Backed by [`std::sync::RwLock`] under `std`; a single [`super::spinlock`]
//! protecting a reader-count/writer-flag pair otherwise.

use core::ops::{Deref, DerefMut};

#[cfg(any(test, feature = "std"))]
pub struct RwLock<T> {
    inner: std::sync::RwLock<T>,
}

#[cfg(any(test, feature = "std"))]
pub struct RwLockReadGuard<'a, T> {
    inner: std::sync::RwLockReadGuard<'a, T>,
}

#[cfg(any(test, feature = "std"))]
pub struct RwLockWriteGuard<'a, T> {
    inner: std::sync::RwLockWriteGuard<'a, T>,
}

#[cfg(any(test, feature = "std"))]
impl<T> RwLock<T> {
    pub const fn new(data: T) -> Self {
        RwLock {
            inner: std::sync::RwLock::new(data),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        RwLockReadGuard {
            inner: self.inner.read().unwrap_or_else(|e| e.into_inner()),
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        RwLockWriteGuard {
            inner: self.inner.write().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(not(any(test, feature = "std")))]
use crate::sync::spinlock::Spinlock;
#[cfg(not(any(test, feature = "std")))]
use core::cell::UnsafeCell;

#[cfg(not(any(test, feature = "std")))]
pub struct RwLock<T> {
    state: Spinlock<RwState>,
    data: UnsafeCell<T>,
}

#[cfg(not(any(test, feature = "std")))]
struct RwState {
    readers: u32,
    writer: bool,
}

#[cfg(not(any(test, feature = "std")))]
unsafe impl<T: Send> Sync for RwLock<T> {}
#[cfg(not(any(test, feature = "std")))]
unsafe impl<T: Send> Send for RwLock<T> {}

#[cfg(not(any(test, feature = "std")))]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

#[cfg(not(any(test, feature = "std")))]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

#[cfg(not(any(test, feature = "std")))]
impl<T> RwLock<T> {
    pub const fn new(data: T) -> Self {
        RwLock {
            state: Spinlock::new(RwState {
                readers: 0,
                writer: false,
            }),
            data: UnsafeCell::new(data),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        loop {
            {
                let mut state = self.state.lock();
                if !state.writer {
                    state.readers += 1;
                    return RwLockReadGuard { lock: self };
                }
            }
            core::hint::spin_loop();
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        loop {
            {
                let mut state = self.state.lock();
                if !state.writer && state.readers == 0 {
                    state.writer = true;
                    return RwLockWriteGuard { lock: self };
                }
            }
            core::hint::spin_loop();
        }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.lock().readers -= 1;
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

#[cfg(not(any(test, feature = "std")))]
impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.lock().writer = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_readers_allowed() {
        let lock = RwLock::new(5);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 5);
        assert_eq!(*r2, 5);
    }

    #[test]
    fn writer_sees_prior_writes() {
        let lock = RwLock::new(0);
        {
            let mut w = lock.write();
            *w = 42;
        }
        assert_eq!(*lock.read(), 42);
    }
}
