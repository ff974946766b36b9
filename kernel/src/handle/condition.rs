//! Kernel conditions (spec §6's `condition_create`/`condition_set`): a
//! handle-backed boolean flag a client can poll or `object_wait` on,
//! grounded in the POSIX service's "signal condition" (spec §4.E:
//! `GET_SIGNAL_CONDITION`) generalized into its own kernel primitive rather
//! than something baked into the POSIX service alone.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::handle::{KernelObject, ObjectType};
use crate::sync::notifier::Notifier;

pub struct Condition {
    signalled: AtomicBool,
    notifier: Notifier,
}

impl Condition {
    pub fn new() -> Self {
        Condition {
            signalled: AtomicBool::new(false),
            notifier: Notifier::new(),
        }
    }

    /// Set the condition's signalled state. Fires the notifier exactly
    /// once per transition from unsignalled to signalled; clearing never
    /// fires it.
    pub fn set(&self, signalled: bool) {
        let was = self.signalled.swap(signalled, Ordering::SeqCst);
        if signalled && !was {
            self.notifier.fire();
        }
    }

    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelObject for Condition {
    fn object_type(&self) -> ObjectType {
        ObjectType::Condition
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_fires_once_per_transition() {
        let condition = Condition::new();
        let fired = alloc::sync::Arc::new(core::sync::atomic::AtomicU32::new(0));
        let fired2 = alloc::sync::Arc::clone(&fired);
        condition.notifier.register(alloc::boxed::Box::new(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        condition.set(false);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        condition.set(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(condition.is_signalled());
    }
}
