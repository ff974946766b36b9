//! Process groups (spec §3): a named set of processes, used by the POSIX
//! service to implement group-directed signals and session leadership. The
//! group itself fires a death event once its member set becomes empty.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::handle::{KernelObject, ObjectType};
use crate::sync::mutex::Mutex;
use crate::sync::notifier::Notifier;

pub struct ProcessGroup {
    pub gpid: u64,
    members: Mutex<Vec<u64>>,
    /// Whether a child created by a member should automatically join this
    /// group (spec §3's "inherit on fork" flag).
    inherit_on_fork: core::sync::atomic::AtomicBool,
    empty_notifier: Notifier,
}

impl ProcessGroup {
    pub fn new(gpid: u64) -> Arc<ProcessGroup> {
        Arc::new(ProcessGroup {
            gpid,
            members: Mutex::new(Vec::new()),
            inherit_on_fork: core::sync::atomic::AtomicBool::new(true),
            empty_notifier: Notifier::new(),
        })
    }

    pub fn add(&self, pid: u64) {
        let mut members = self.members.lock();
        if !members.contains(&pid) {
            members.push(pid);
        }
    }

    /// Remove `pid` from the group. Fires the empty notifier exactly once
    /// when the last member leaves. A no-op if `pid` is not a member,
    /// including on an already-empty group — callers (process death
    /// cascading through every group it ever joined, an explicit
    /// `process_group_remove`) may both try to remove the same pid, and a
    /// removal that changes nothing must never re-fire the notifier.
    pub fn remove(&self, pid: u64) {
        let mut members = self.members.lock();
        if !members.contains(&pid) {
            return;
        }
        members.retain(|&p| p != pid);
        let now_empty = members.is_empty();
        drop(members);
        if now_empty {
            self.empty_notifier.fire();
        }
    }

    pub fn members(&self) -> Vec<u64> {
        self.members.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    pub fn inherit_on_fork(&self) -> bool {
        self.inherit_on_fork.load(core::sync::atomic::Ordering::SeqCst)
    }

    pub fn set_inherit_on_fork(&self, value: bool) {
        self.inherit_on_fork.store(value, core::sync::atomic::Ordering::SeqCst);
    }
}

impl KernelObject for ProcessGroup {
    fn object_type(&self) -> ObjectType {
        ObjectType::ProcessGroup
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.empty_notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn add_remove_tracks_membership() {
        let group = ProcessGroup::new(1);
        group.add(10);
        group.add(11);
        assert_eq!(group.members(), alloc::vec![10, 11]);
        group.remove(10);
        assert_eq!(group.members(), alloc::vec![11]);
    }

    #[test]
    fn empty_notifier_fires_once_group_drains() {
        let group = ProcessGroup::new(1);
        group.add(10);
        group.add(11);
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = Arc::clone(&fired);
        group.empty_notifier.register(alloc::boxed::Box::new(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        group.remove(10);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        group.remove(11);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
