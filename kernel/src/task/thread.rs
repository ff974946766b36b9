//! Threads (spec §3/§4.C): the unit of execution within a process, carrying
//! its own interrupt queue, token override, and accounting.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::clock::Ticks;
use crate::handle::{KernelObject, ObjectType};
use crate::status::Status;
use crate::sync::mutex::Mutex;
use crate::sync::notifier::Notifier;
use crate::sync::rwlock::RwLock;
use crate::task::exit_status::{self, ExitReason};
use crate::task::process::Process;
use crate::task::token::Token;
use crate::task::wait_queue::WaitQueue;

/// A thread's coarse run state. There is no real scheduler in this crate;
/// `Running`/`Sleeping` only exist to let callers observe and serialize on
/// the transition to `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRunState {
    Running,
    Sleeping,
    Dead,
}

/// An asynchronous interrupt queued against a thread (spec §4.C): killed,
/// a POSIX-style signal, or a user APC. Delivered highest priority first,
/// FIFO among equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInterrupt {
    pub priority: u8,
    pub value: u32,
}

pub struct Thread {
    pub tid: u64,
    pub name: String,
    process: Weak<Process>,
    state: Mutex<ThreadRunState>,
    /// Interrupt priority level: while raised, only interrupts of strictly
    /// higher priority are deliverable (spec §4.C's IPL gate).
    ipl: AtomicU8,
    interrupts: Mutex<Vec<ThreadInterrupt>>,
    killed: AtomicBool,
    token_override: RwLock<Option<Arc<Token>>>,
    user_time: AtomicU64,
    kernel_time: AtomicU64,
    wait_queue: WaitQueue,
    death: WaitQueue,
    death_notifier: Notifier,
    exit_status: AtomicU32,
}

impl Thread {
    pub fn new(tid: u64, name: String, process: Weak<Process>) -> Arc<Thread> {
        Arc::new(Thread {
            tid,
            name,
            process,
            state: Mutex::new(ThreadRunState::Running),
            ipl: AtomicU8::new(0),
            interrupts: Mutex::new(Vec::new()),
            killed: AtomicBool::new(false),
            token_override: RwLock::new(None),
            user_time: AtomicU64::new(0),
            kernel_time: AtomicU64::new(0),
            wait_queue: WaitQueue::new(),
            death: WaitQueue::new(),
            death_notifier: Notifier::new(),
            exit_status: AtomicU32::new(exit_status::encode(ExitReason::Normal, 0)),
        })
    }

    pub fn exit_status(&self) -> u32 {
        self.exit_status.load(Ordering::Acquire)
    }

    pub fn set_exit_status(&self, status: u32) {
        self.exit_status.store(status, Ordering::Release);
    }

    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.upgrade()
    }

    pub fn state(&self) -> ThreadRunState {
        *self.state.lock()
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ThreadRunState::Dead
    }

    /// Mark this thread dead and wake anyone waiting on [`join`].
    ///
    /// Idempotent: a second call is a no-op, since a thread exits exactly
    /// once.
    pub fn mark_dead(&self) {
        let mut state = self.state.lock();
        if *state == ThreadRunState::Dead {
            return;
        }
        *state = ThreadRunState::Dead;
        drop(state);
        self.death.wake_all();
        self.death_notifier.fire();
    }

    pub fn join(&self, timeout: Ticks) -> Status {
        if self.is_dead() {
            return Status::Ok;
        }
        let status = self.death.sleep(timeout, || self.is_dead());
        if self.is_dead() {
            Status::Ok
        } else {
            status
        }
    }

    /// Sleep on this thread's own wait queue until woken, `timeout` ticks
    /// pass, or the thread is interrupted by a deliverable interrupt or
    /// kill (spec §4.C).
    pub fn sleep(&self, timeout: Ticks) -> Status {
        *self.state.lock() = ThreadRunState::Sleeping;
        let status = self
            .wait_queue
            .sleep(timeout, || self.has_deliverable_interrupt() || self.is_killed());
        *self.state.lock() = ThreadRunState::Running;
        status
    }

    pub fn wake(&self) {
        self.wait_queue.wake_all();
    }

    pub fn set_ipl(&self, ipl: u8) -> u8 {
        self.ipl.swap(ipl, Ordering::SeqCst)
    }

    pub fn ipl(&self) -> u8 {
        self.ipl.load(Ordering::SeqCst)
    }

    /// Queue an interrupt, highest priority first, FIFO within a priority.
    pub fn interrupt(&self, interrupt: ThreadInterrupt) {
        let mut interrupts = self.interrupts.lock();
        let pos = interrupts
            .iter()
            .position(|existing| existing.priority < interrupt.priority)
            .unwrap_or(interrupts.len());
        interrupts.insert(pos, interrupt);
        drop(interrupts);
        self.wake();
    }

    fn has_deliverable_interrupt(&self) -> bool {
        let ipl = self.ipl();
        self.interrupts
            .lock()
            .first()
            .is_some_and(|i| i.priority > ipl)
    }

    /// Pop the highest-priority interrupt deliverable at the current IPL,
    /// if any.
    pub fn take_deliverable_interrupt(&self) -> Option<ThreadInterrupt> {
        let ipl = self.ipl();
        let mut interrupts = self.interrupts.lock();
        match interrupts.first() {
            Some(i) if i.priority > ipl => Some(interrupts.remove(0)),
            _ => None,
        }
    }

    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn set_token_override(&self, token: Option<Arc<Token>>) {
        *self.token_override.write() = token;
    }

    /// This thread's effective token: its own override if set, else its
    /// process's.
    pub fn effective_token(&self) -> Option<Arc<Token>> {
        if let Some(token) = self.token_override.read().clone() {
            return Some(token);
        }
        self.process().map(|p| p.token())
    }

    pub fn add_user_time(&self, ticks: u64) {
        self.user_time.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn add_kernel_time(&self, ticks: u64) {
        self.kernel_time.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn user_time(&self) -> u64 {
        self.user_time.load(Ordering::Relaxed)
    }

    pub fn kernel_time(&self) -> u64 {
        self.kernel_time.load(Ordering::Relaxed)
    }
}

impl KernelObject for Thread {
    fn object_type(&self) -> ObjectType {
        ObjectType::Thread
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.death_notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}
