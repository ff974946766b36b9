//! `process_group_*` syscalls (spec §6), plus the global group registry
//! (gpid → group) the POSIX service's `GETPGID`/`SETPGID` family is built
//! on top of.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::handle::KernelObject;
use crate::status::Status;
use crate::sync::rwlock::RwLock;
use crate::task::group::ProcessGroup;
use crate::task::process::Process;

static NEXT_GPID: AtomicU64 = AtomicU64::new(1);
static GROUP_REGISTRY: RwLock<BTreeMap<u64, Arc<ProcessGroup>>> = RwLock::new(BTreeMap::new());

/// `process_group_create`: allocate a gpid, create a group containing only
/// `owner`, and register it so it's reachable by gpid. Deregisters itself
/// from the table the moment its membership drains to zero.
pub fn process_group_create(owner: &Arc<Process>) -> Arc<ProcessGroup> {
    let gpid = NEXT_GPID.fetch_add(1, Ordering::SeqCst);
    let group = ProcessGroup::new(gpid);
    group.add(owner.pid);
    owner.join_group(Arc::downgrade(&group));
    GROUP_REGISTRY.write().insert(gpid, Arc::clone(&group));

    let reaped_gpid = gpid;
    group
        .notifier()
        .expect("ProcessGroup always has an empty notifier")
        .register(Box::new(move || {
            GROUP_REGISTRY.write().remove(&reaped_gpid);
        }));
    group
}

fn lookup(gpid: u64) -> Result<Arc<ProcessGroup>, Status> {
    GROUP_REGISTRY.read().get(&gpid).cloned().ok_or(Status::NotFound)
}

/// `process_group_add`: join `member` to group `gpid`.
pub fn process_group_add(gpid: u64, member: &Arc<Process>) -> Status {
    let group = match lookup(gpid) {
        Ok(g) => g,
        Err(status) => return status,
    };
    group.add(member.pid);
    member.join_group(Arc::downgrade(&group));
    Status::Ok
}

/// `process_group_remove`: leave group `gpid`.
pub fn process_group_remove(gpid: u64, member: &Arc<Process>) -> Status {
    let group = match lookup(gpid) {
        Ok(g) => g,
        Err(status) => return status,
    };
    group.remove(member.pid);
    Status::Ok
}

/// `process_group_query`: current membership of group `gpid`.
pub fn process_group_query(gpid: u64) -> Result<Vec<u64>, Status> {
    Ok(lookup(gpid)?.members())
}

/// `process_group_enumerate`: every gpid currently registered.
pub fn process_group_enumerate() -> Vec<u64> {
    GROUP_REGISTRY.read().keys().copied().collect()
}
