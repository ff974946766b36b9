//! Processes (spec §3/§4.C): a handle table, a set of threads, and a
//! security token, torn down exactly once when its last thread dies.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::handle::{HandleTable, KernelObject, ObjectType};
use crate::status::Status;
use crate::sync::mutex::Mutex;
use crate::sync::notifier::Notifier;
use crate::sync::rwlock::RwLock;
use crate::task::exit_status::{self, ExitReason};
use crate::task::group::ProcessGroup;
use crate::task::thread::Thread;
use crate::task::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Running,
    Dead,
}

pub struct Process {
    pub pid: u64,
    pub name: String,
    state: Mutex<ProcessState>,
    running_threads: AtomicUsize,
    token: RwLock<Arc<Token>>,
    pub handles: HandleTable,
    threads: Mutex<Vec<Arc<Thread>>>,
    groups: Mutex<Vec<Weak<ProcessGroup>>>,
    death_notifier: Notifier,
    /// The IPC endpoint inherited/created at process start, stored behind
    /// the generic object trait so this module doesn't need to depend on
    /// the concrete port type.
    root_port: RwLock<Option<Arc<dyn KernelObject>>>,
    /// Exit-status encoding (spec §6), set by `process_exit`/the last
    /// thread's natural death; read back via `process_status`.
    exit_status: AtomicU32,
}

impl Process {
    pub fn new(pid: u64, name: String, token: Arc<Token>) -> Arc<Process> {
        Arc::new(Process {
            pid,
            name,
            state: Mutex::new(ProcessState::Created),
            running_threads: AtomicUsize::new(0),
            token: RwLock::new(token),
            handles: HandleTable::new(),
            threads: Mutex::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
            death_notifier: Notifier::new(),
            root_port: RwLock::new(None),
            exit_status: AtomicU32::new(exit_status::encode(ExitReason::Normal, 0)),
        })
    }

    pub fn exit_status(&self) -> u32 {
        self.exit_status.load(Ordering::Acquire)
    }

    /// Record the reason the process is exiting. Idempotent in the sense
    /// that the last call before death wins; `mark_dead` does not overwrite
    /// it, so a natural "last thread exited" death keeps whatever exit
    /// status the final `thread_exit`/`process_exit` call set.
    pub fn set_exit_status(&self, status: u32) {
        self.exit_status.store(status, Ordering::Release);
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ProcessState::Dead
    }

    pub fn token(&self) -> Arc<Token> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: Arc<Token>) {
        *self.token.write() = token;
    }

    pub fn set_root_port(&self, port: Arc<dyn KernelObject>) {
        *self.root_port.write() = Some(port);
    }

    pub fn root_port(&self) -> Option<Arc<dyn KernelObject>> {
        self.root_port.read().clone()
    }

    /// Move `Created` to `Running` and register `thread` as live. Must be
    /// called once per thread creation, including the process's first
    /// thread.
    pub fn add_thread(&self, thread: Arc<Thread>) -> Status {
        let mut state = self.state.lock();
        if *state == ProcessState::Dead {
            return Status::InvalidArg;
        }
        *state = ProcessState::Running;
        drop(state);
        self.running_threads.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().push(thread);
        Status::Ok
    }

    /// Record that `thread` has exited. When the last thread of a process
    /// that has had at least one thread exits, the process dies and its
    /// death notifier fires exactly once.
    pub fn thread_exited(&self, thread: &Arc<Thread>) {
        self.threads.lock().retain(|t| !Arc::ptr_eq(t, thread));
        let remaining = self.running_threads.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.mark_dead();
        }
    }

    fn mark_dead(&self) {
        let mut state = self.state.lock();
        if *state == ProcessState::Dead {
            return;
        }
        *state = ProcessState::Dead;
        drop(state);
        self.leave_all_groups();
        self.death_notifier.fire();
    }

    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.threads.lock().clone()
    }

    pub fn join_group(&self, group: Weak<ProcessGroup>) {
        self.groups.lock().push(group);
    }

    fn leave_all_groups(&self) {
        for group in self.groups.lock().drain(..) {
            if let Some(group) = group.upgrade() {
                group.remove(self.pid);
            }
        }
    }
}

impl KernelObject for Process {
    fn object_type(&self) -> ObjectType {
        ObjectType::Process
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.death_notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32;

    fn token() -> Arc<Token> {
        Arc::new(Token::new(1, 1, 0))
    }

    #[test]
    fn single_thread_death_kills_process() {
        let process = Process::new(1, "p".into(), token());
        let thread = Thread::new(1, "t".into(), Arc::downgrade(&process));
        process.add_thread(Arc::clone(&thread));
        assert_eq!(process.state(), ProcessState::Running);
        process.thread_exited(&thread);
        assert_eq!(process.state(), ProcessState::Dead);
    }

    #[test]
    fn process_survives_until_last_thread_exits() {
        let process = Process::new(1, "p".into(), token());
        let t1 = Thread::new(1, "a".into(), Arc::downgrade(&process));
        let t2 = Thread::new(2, "b".into(), Arc::downgrade(&process));
        process.add_thread(Arc::clone(&t1));
        process.add_thread(Arc::clone(&t2));
        process.thread_exited(&t1);
        assert_eq!(process.state(), ProcessState::Running);
        process.thread_exited(&t2);
        assert_eq!(process.state(), ProcessState::Dead);
    }

    #[test]
    fn death_notifier_fires_once() {
        let process = Process::new(1, "p".into(), token());
        let thread = Thread::new(1, "t".into(), Arc::downgrade(&process));
        process.add_thread(Arc::clone(&thread));
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        process
            .death_notifier
            .register(alloc::boxed::Box::new(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            }));
        process.thread_exited(&thread);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
