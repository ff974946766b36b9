//! A list of one-shot callbacks, fired in registration order when the event
//! they were registered for occurs.
//!
//! Used by [`crate::handle::HandleTable`] to implement the wait/unwait
//! contract of spec §6: callers register a callback against an object's
//! notifier instead of blocking inline, and the object fires it (once) when
//! its waitable state changes (a connection hangs up, a process exits, ...).

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::sync::spinlock::Spinlock;

type Callback = Box<dyn FnOnce() + Send>;

/// An opaque token identifying a registered callback, so it can be removed
/// before it fires (e.g. when the waiter gives up or closes its handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierToken(u64);

#[derive(Default)]
struct NotifierInner {
    next_token: u64,
    callbacks: Vec<(NotifierToken, Callback)>,
}

/// A registry of one-shot waiters for a single event source.
pub struct Notifier {
    inner: Spinlock<NotifierInner>,
}

impl Notifier {
    pub const fn new() -> Self {
        Notifier {
            inner: Spinlock::new(NotifierInner {
                next_token: 0,
                callbacks: Vec::new(),
            }),
        }
    }

    /// Register `callback` to run the next time [`Notifier::fire`] is
    /// called. Returns a token that can be passed to [`Notifier::cancel`].
    pub fn register(&self, callback: Callback) -> NotifierToken {
        let mut inner = self.inner.lock();
        let token = NotifierToken(inner.next_token);
        inner.next_token += 1;
        inner.callbacks.push((token, callback));
        token
    }

    /// Remove a previously registered callback without running it. Returns
    /// `false` if the token was already fired or never registered.
    pub fn cancel(&self, token: NotifierToken) -> bool {
        let mut inner = self.inner.lock();
        let len_before = inner.callbacks.len();
        inner.callbacks.retain(|(t, _)| *t != token);
        inner.callbacks.len() != len_before
    }

    /// Run and remove every registered callback, in registration order.
    pub fn fire(&self) {
        let callbacks = {
            let mut inner = self.inner.lock();
            core::mem::take(&mut inner.callbacks)
        };
        for (_, callback) in callbacks {
            callback();
        }
    }

    /// `true` if no callbacks are currently registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().callbacks.is_empty()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fire_runs_all_callbacks_once() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            notifier.register(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        notifier.fire();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        notifier.fire();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancel_prevents_callback() {
        let notifier = Notifier::new();
        let ran = Arc::new(AtomicU32::new(0));
        let ran2 = Arc::clone(&ran);
        let token = notifier.register(Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(notifier.cancel(token));
        notifier.fire();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
