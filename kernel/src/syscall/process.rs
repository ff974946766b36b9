//! `process_*` syscalls (spec §6), plus the global process tree the
//! concurrency model calls for ("Process tree and thread tree: one global
//! rwlock each, read-locked during lookup", spec §5).
//!
//! There is no real trap boundary in this crate (no scheduler owns a
//! "current process" register) — every syscall here takes the calling
//! process explicitly instead of reading it off a CPU-local current-thread
//! pointer the way a hosted kernel would. `exec`/`clone` are named in spec
//! §6's surface but need an address-space/image-loader layer this core
//! doesn't model (out of scope per spec §1's "out of scope" list); they're
//! stubbed as `NotSupported`.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::handle::Rights;
use crate::status::Status;
use crate::sync::rwlock::RwLock;
use crate::task::exit_status::{self, ExitReason};
use crate::task::process::Process;
use crate::task::token::{Token, PRIV_KERNEL};

static NEXT_PID: AtomicU64 = AtomicU64::new(1);
static PROCESS_TREE: RwLock<BTreeMap<u64, Weak<Process>>> = RwLock::new(BTreeMap::new());

/// `process_create`: allocate a PID, create the process, and register it.
pub fn process_create(name: String, token: Arc<Token>) -> Arc<Process> {
    let pid = NEXT_PID.fetch_add(1, Ordering::SeqCst);
    let process = Process::new(pid, name, token);
    PROCESS_TREE.write().insert(pid, Arc::downgrade(&process));
    process
}

/// `process_exec`: out of scope (spec §1 excludes the image loader/VFS path
/// walker this would need).
pub fn process_exec() -> Status {
    Status::NotSupported
}

/// `process_clone`: out of scope for the same reason as `process_exec`.
pub fn process_clone() -> Status {
    Status::NotSupported
}

/// `process_open`: look up a live process by PID.
pub fn process_open(pid: u64) -> Result<Arc<Process>, Status> {
    PROCESS_TREE
        .read()
        .get(&pid)
        .and_then(Weak::upgrade)
        .ok_or(Status::NotFound)
}

pub fn process_id(process: &Arc<Process>) -> u64 {
    process.pid
}

/// `process_access`: `true` iff `caller` may act on `target` — same
/// process, or `caller`'s token carries [`PRIV_KERNEL`].
pub fn process_access(caller: &Arc<Process>, target: &Arc<Process>) -> bool {
    Arc::ptr_eq(caller, target) || caller.token().is_kernel()
}

/// `process_security`: `target`'s current security token.
pub fn process_security(target: &Arc<Process>) -> Arc<Token> {
    target.token()
}

/// `process_token`/`process_set_token`.
pub fn process_token(process: &Arc<Process>) -> Arc<Token> {
    process.token()
}

pub fn process_set_token(caller: &Arc<Process>, target: &Arc<Process>, token: Arc<Token>) -> Status {
    if !process_access(caller, target) {
        return Status::AccessDenied;
    }
    target.set_token(token);
    Status::Ok
}

/// `process_port`: install a handle to `target`'s root IPC port in
/// `caller`'s table.
pub fn process_port(caller: &Arc<Process>, target: &Arc<Process>) -> Result<u32, Status> {
    let port = target.root_port().ok_or(Status::NotFound)?;
    Ok(caller.handles.insert(port, Rights::TRANSFERRABLE))
}

/// `process_status`: `target`'s exit-status encoding, valid once it's dead.
/// `AccessDenied` if it's still running (mirrors `waitpid`'s "not yet
/// exited" case being a separate, blocking, call at the POSIX layer rather
/// than this kernel-level accessor).
pub fn process_status(target: &Arc<Process>) -> Result<u32, Status> {
    if !target.is_dead() {
        return Err(Status::WouldBlock);
    }
    Ok(target.exit_status())
}

/// `process_kill`: record the killed-by-signal exit status and tear every
/// thread of `target` down, subject to the same access check as
/// `process_set_token`.
pub fn process_kill(caller: &Arc<Process>, target: &Arc<Process>, signal: u16) -> Status {
    if !process_access(caller, target) {
        return Status::AccessDenied;
    }
    target.set_exit_status(exit_status::encode(ExitReason::Killed, signal));
    for thread in target.threads() {
        thread.kill();
    }
    Status::Ok
}

/// `process_set_exception_handler`: out of scope (no architecture-specific
/// exception delivery layer here); always succeeds as a no-op so callers
/// that don't rely on it aren't broken.
pub fn process_set_exception_handler(_process: &Arc<Process>, _code: u32, _handler: usize) -> Status {
    Status::Ok
}

/// `process_control`: reserved out-of-band knob in the original surface
/// with no concrete operations defined by spec; not implemented.
pub fn process_control() -> Status {
    Status::NotSupported
}

/// `process_exit`: record the normal-exit status and kill every thread,
/// same as `process_kill` but with `ExitReason::Normal`.
pub fn process_exit(process: &Arc<Process>, status: u16) {
    process.set_exit_status(exit_status::encode(ExitReason::Normal, status));
    for thread in process.threads() {
        thread.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Arc<Token> {
        Arc::new(Token::new(0, 0, 0))
    }

    #[test]
    fn create_then_open_round_trips() {
        let process = process_create("a".into(), token());
        let pid = process_id(&process);
        let opened = process_open(pid).unwrap();
        assert!(Arc::ptr_eq(&process, &opened));
    }

    #[test]
    fn open_unknown_pid_not_found() {
        assert_eq!(process_open(999_999), Err(Status::NotFound));
    }

    #[test]
    fn status_would_block_until_dead() {
        use crate::task::thread::Thread;

        let process = process_create("a".into(), token());
        let thread = Thread::new(1, "t".into(), Arc::downgrade(&process));
        process.add_thread(Arc::clone(&thread));

        assert_eq!(process_status(&process), Err(Status::WouldBlock));
        process.thread_exited(&thread);
        let (reason, value) = exit_status::decode(process_status(&process).unwrap());
        assert_eq!(reason, ExitReason::Normal);
        assert_eq!(value, 0);
    }

    #[test]
    fn kill_requires_access() {
        let caller = process_create("caller".into(), token());
        let target = process_create("target".into(), Arc::new(Token::new(1, 1, 0)));
        assert_eq!(process_kill(&caller, &target, 9), Status::AccessDenied);

        let privileged = process_create("root".into(), Arc::new(Token::new(0, 0, PRIV_KERNEL)));
        assert_eq!(process_kill(&privileged, &target, 9), Status::Ok);
    }
}
