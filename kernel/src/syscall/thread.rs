//! `thread_*` syscalls (spec §6), plus the global thread tree mirroring
//! [`super::process`]'s process tree (spec §5: "Process tree and thread
//! tree: one global rwlock each").

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::clock::Ticks;
use crate::status::Status;
use crate::sync::rwlock::RwLock;
use crate::task::exit_status::{self, ExitReason};
use crate::task::process::Process;
use crate::task::thread::{Thread, ThreadInterrupt};
use crate::task::token::Token;

static NEXT_TID: AtomicU64 = AtomicU64::new(1);
static THREAD_TREE: RwLock<BTreeMap<u64, Weak<Thread>>> = RwLock::new(BTreeMap::new());

/// `thread_create`: allocate a TID, create the thread, register it with
/// `process` and the global thread tree.
pub fn thread_create(process: &Arc<Process>, name: String) -> Result<Arc<Thread>, Status> {
    let tid = NEXT_TID.fetch_add(1, Ordering::SeqCst);
    let thread = Thread::new(tid, name, Arc::downgrade(process));
    let status = process.add_thread(Arc::clone(&thread));
    if status != Status::Ok {
        return Err(status);
    }
    THREAD_TREE.write().insert(tid, Arc::downgrade(&thread));
    Ok(thread)
}

pub fn thread_open(tid: u64) -> Result<Arc<Thread>, Status> {
    THREAD_TREE
        .read()
        .get(&tid)
        .and_then(Weak::upgrade)
        .ok_or(Status::NotFound)
}

pub fn thread_id(thread: &Arc<Thread>) -> u64 {
    thread.tid
}

/// `thread_security`: the thread's effective token (its own override, or
/// its process's).
pub fn thread_security(thread: &Arc<Thread>) -> Option<Arc<Token>> {
    thread.effective_token()
}

/// `thread_status`: exit-status encoding, valid once the thread is dead.
pub fn thread_status(thread: &Arc<Thread>) -> Result<u32, Status> {
    if !thread.is_dead() {
        return Err(Status::WouldBlock);
    }
    Ok(thread.exit_status())
}

fn access_check(caller: &Arc<Process>, thread: &Arc<Thread>) -> bool {
    match thread.process() {
        Some(owner) => Arc::ptr_eq(caller, &owner) || caller.token().is_kernel(),
        None => caller.token().is_kernel(),
    }
}

/// `thread_kill`: interrupt `thread` out of any wait and mark it killed.
pub fn thread_kill(caller: &Arc<Process>, thread: &Arc<Thread>) -> Status {
    if !access_check(caller, thread) {
        return Status::AccessDenied;
    }
    thread.kill();
    Status::Ok
}

pub fn thread_ipl(thread: &Arc<Thread>) -> u8 {
    thread.ipl()
}

/// `thread_set_ipl`: raise or lower the IPL gate, returning the previous
/// value (also doubles as `thread_restore`'s implementation: restoring a
/// saved IPL is just setting it back).
pub fn thread_set_ipl(thread: &Arc<Thread>, ipl: u8) -> u8 {
    thread.set_ipl(ipl)
}

/// `thread_restore`: re-arm `ipl` after an interrupt handler returns.
pub fn thread_restore(thread: &Arc<Thread>, ipl: u8) -> u8 {
    thread.set_ipl(ipl)
}

pub fn thread_token(thread: &Arc<Thread>) -> Option<Arc<Token>> {
    thread.effective_token()
}

pub fn thread_set_token(caller: &Arc<Process>, thread: &Arc<Thread>, token: Option<Arc<Token>>) -> Status {
    if !access_check(caller, thread) {
        return Status::AccessDenied;
    }
    thread.set_token_override(token);
    Status::Ok
}

/// `thread_set_exception_handler`/`thread_set_exception_stack`: out of
/// scope (no architecture-specific exception delivery layer); no-ops that
/// succeed so callers relying only on the kill/interrupt path aren't
/// broken.
pub fn thread_set_exception_handler(_thread: &Arc<Thread>, _code: u32, _handler: usize) -> Status {
    Status::Ok
}

pub fn thread_set_exception_stack(_thread: &Arc<Thread>, _stack: usize, _size: usize) -> Status {
    Status::Ok
}

/// `thread_raise`: queue a thread interrupt (spec §4.C).
pub fn thread_raise(thread: &Arc<Thread>, priority: u8, value: u32) -> Status {
    thread.interrupt(ThreadInterrupt { priority, value });
    Status::Ok
}

/// `thread_sleep`: block the calling thread on its own wait queue.
pub fn thread_sleep(thread: &Arc<Thread>, timeout: Ticks) -> Status {
    thread.sleep(timeout)
}

/// `thread_control`: reserved out-of-band knob with no concrete operations
/// defined by spec; not implemented.
pub fn thread_control() -> Status {
    Status::NotSupported
}

/// `thread_exit`: record the exit status, kill the thread, and tell its
/// process it's gone (which may cascade to the process's own death).
pub fn thread_exit(thread: &Arc<Thread>, status: u16) {
    thread.set_exit_status(exit_status::encode(ExitReason::Normal, status));
    thread.mark_dead();
    if let Some(process) = thread.process() {
        process.thread_exited(thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> Arc<Process> {
        Process::new(1, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn create_then_open_round_trips() {
        let p = process();
        let thread = thread_create(&p, "t".into()).unwrap();
        let tid = thread_id(&thread);
        let opened = thread_open(tid).unwrap();
        assert!(Arc::ptr_eq(&thread, &opened));
    }

    #[test]
    fn exit_cascades_to_process_death() {
        let p = process();
        let thread = thread_create(&p, "t".into()).unwrap();
        assert_eq!(thread_status(&thread), Err(Status::WouldBlock));
        thread_exit(&thread, 7);
        let (reason, value) = exit_status::decode(thread_status(&thread).unwrap());
        assert_eq!(reason, ExitReason::Normal);
        assert_eq!(value, 7);
        assert!(p.is_dead());
    }

    #[test]
    fn kill_requires_same_process_or_privilege() {
        let owner = process();
        let thread = thread_create(&owner, "t".into()).unwrap();
        let stranger = Process::new(2, "s".into(), Arc::new(Token::new(1, 1, 0)));
        assert_eq!(thread_kill(&stranger, &thread), Status::AccessDenied);
        assert_eq!(thread_kill(&owner, &thread), Status::Ok);
        assert!(thread.is_killed());
    }

    #[test]
    fn ipl_gates_raised_interrupts() {
        let p = process();
        let thread = thread_create(&p, "t".into()).unwrap();
        thread_set_ipl(&thread, 5);
        thread_raise(&thread, 5, 1);
        assert!(thread.take_deliverable_interrupt().is_none());
        thread_restore(&thread, 0);
        thread_raise(&thread, 5, 1);
        assert!(thread.take_deliverable_interrupt().is_some());
    }
}
