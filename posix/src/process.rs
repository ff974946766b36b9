//! A POSIX process record (spec §4.E), grounded in
//! `examples/original_source/source/services/posix_service/process.{h,cpp}`.
//!
//! Owns the per-process signal table and drives the signal delivery
//! algorithm described there: `sendSignal`/`updateSignals`/the default
//! action table. Session/group membership lives one level up, in
//! [`crate::service::Service`], since changing group membership needs the
//! whole registry in scope.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use kernel::handle::KernelObject;
use kernel::sync::timer::Timer;
use kernel::syscall::{condition_set, process_kill, timer_create, timer_start, timer_stop};
use kernel::task::process::Process;

use crate::signal::{self, DefaultOutcome, Disposition, SigInfo, SignalState, NSIG, SIGALRM};

/// This workspace has no real hardware timer, so a tick is whatever
/// `kernel::clock::TICK_DURATION` says it is (1ms in hosted builds).
fn ticks_per_second() -> u64 {
    1000 / kernel::clock::TICK_DURATION.as_millis().max(1) as u64
}

fn ticks_to_seconds(ticks: u64) -> u32 {
    (ticks / ticks_per_second().max(1)) as u32
}

pub struct PosixProcess {
    pub process: Arc<Process>,
    pub pid: u64,
    signals: Mutex<[SignalState; NSIG]>,
    pending: AtomicU32,
    mask: AtomicU32,
    signal_condition: Mutex<Option<(u32, Arc<dyn KernelObject>)>>,
    alarm_timer: Mutex<Option<(u32, Arc<dyn KernelObject>)>>,
    /// The service's own process, used as the privileged caller for
    /// `process_kill` when a default-dispositioned signal terminates the
    /// target (original comment: "requires privileged access to the
    /// process... not necessary to call with the sending thread's security
    /// context").
    kill_caller: Arc<Process>,
}

impl PosixProcess {
    pub fn new(process: Arc<Process>, kill_caller: Arc<Process>) -> Arc<PosixProcess> {
        let pid = process.pid;
        Arc::new(PosixProcess {
            process,
            pid,
            signals: Mutex::new([SignalState::default(); NSIG]),
            pending: AtomicU32::new(0),
            mask: AtomicU32::new(0),
            signal_condition: Mutex::new(None),
            alarm_timer: Mutex::new(None),
            kill_caller,
        })
    }

    fn signals_deliverable(&self) -> u32 {
        self.pending.load(Ordering::SeqCst) & !self.mask.load(Ordering::SeqCst)
    }

    fn signal_condition_handle(&self) -> Option<u32> {
        self.signal_condition.lock().unwrap().as_ref().map(|(h, _)| *h)
    }

    /// `GET_SIGNAL_CONDITION`: lazily create the condition, return its
    /// handle.
    pub fn get_signal_condition(&self) -> u32 {
        let mut slot = self.signal_condition.lock().unwrap();
        if slot.is_none() {
            let handle = kernel::syscall::condition_create(&self.process);
            let object = self.process.handles.get(handle).expect("just inserted");
            *slot = Some((handle, object));
        }
        slot.as_ref().unwrap().0
    }

    /// Re-test deliverability of every pending signal: default-dispositioned
    /// ones are actioned immediately, handler-dispositioned ones are left
    /// for `GET_PENDING_SIGNAL` to drain. Updates the signal condition to
    /// reflect whether any handler-dispositioned signal remains deliverable.
    pub fn update_signals(&self) {
        let mut need_handler = false;
        let mut deliverable = self.signals_deliverable();

        while deliverable != 0 {
            let num = deliverable.trailing_zeros();
            deliverable &= !(1 << num);

            let disposition = self.signals.lock().unwrap()[num as usize].disposition;
            match disposition {
                Disposition::Ignore => unreachable!("ignored signals must not be pending"),
                Disposition::Default => {
                    match signal::resolve_default(num) {
                        DefaultOutcome::Kill(status) => {
                            let result = process_kill(&self.kill_caller, &self.process, status);
                            if result != kernel::Status::Ok {
                                log::error!("posix: failed to kill pid {} for signal {num}: {result}", self.pid);
                            }
                        }
                        DefaultOutcome::StopContinue => {
                            log::warn!("posix: TODO signal stop/continue for pid {} signal {num}", self.pid);
                        }
                        DefaultOutcome::Ignore => {}
                    }
                    self.pending.fetch_and(!(1 << num), Ordering::SeqCst);
                }
                Disposition::Handler => {
                    // Left pending; `GET_PENDING_SIGNAL` clears it.
                    need_handler = true;
                }
            }
        }

        if let Some(handle) = self.signal_condition_handle() {
            let _ = condition_set(&self.process, handle, need_handler);
        }
    }

    /// `sendSignal`: raise `num`, captured with `sender_pid`/`sender_uid` as
    /// the originator. A no-op if already pending or ignored.
    pub fn send_signal(&self, num: u32, sender_pid: u64, sender_uid: u32) {
        let bit = 1u32 << num;
        let mut signals = self.signals.lock().unwrap();
        let state = &mut signals[num as usize];
        if state.disposition == Disposition::Ignore || self.pending.load(Ordering::SeqCst) & bit != 0 {
            return;
        }
        state.info = SigInfo { signo: num, sender_pid, sender_uid };
        drop(signals);
        self.pending.fetch_or(bit, Ordering::SeqCst);
        self.update_signals();
    }

    /// `GET_PENDING_SIGNAL`: pop the lowest-numbered deliverable
    /// handler-dispositioned signal, or a zeroed `siginfo` if none.
    pub fn get_pending_signal(&self) -> SigInfo {
        let deliverable = self.signals_deliverable();
        let info = if deliverable != 0 {
            let num = deliverable.trailing_zeros();
            let info = self.signals.lock().unwrap()[num as usize].info;
            self.pending.fetch_and(!(1 << num), Ordering::SeqCst);
            info
        } else {
            SigInfo::default()
        };
        self.update_signals();
        info
    }

    /// `SET_SIGNAL_ACTION`: `num` must be in `1..NSIG`; `SIGKILL`/`SIGSTOP`
    /// may not be set to non-default.
    pub fn set_signal_action(&self, num: u32, disposition: Disposition, flags: u32) -> Result<(), crate::error::Errno> {
        if num < 1 || num as usize >= NSIG {
            return Err(crate::error::EINVAL);
        }
        if matches!(disposition, Disposition::Ignore | Disposition::Handler)
            && (num == signal::SIGKILL || num == signal::SIGSTOP)
        {
            return Err(crate::error::EINVAL);
        }

        let mut signals = self.signals.lock().unwrap();
        signals[num as usize].disposition = disposition;
        signals[num as usize].flags = flags;
        let became_ignore = disposition == Disposition::Ignore;
        drop(signals);

        if became_ignore {
            self.pending.fetch_and(!(1 << num), Ordering::SeqCst);
            self.update_signals();
        }
        Ok(())
    }

    /// `SET_SIGNAL_MASK`: `SIGKILL`/`SIGSTOP` bits are silently cleared.
    pub fn set_signal_mask(&self, mask: u32) {
        let mut mask = mask;
        mask &= !(1 << signal::SIGKILL);
        mask &= !(1 << signal::SIGSTOP);
        if mask != self.mask.load(Ordering::SeqCst) {
            self.mask.store(mask, Ordering::SeqCst);
            self.update_signals();
        }
    }

    /// `ALARM(seconds)`: (re)arm or cancel the one-shot alarm timer, firing
    /// SIGALRM at this process when it expires. Returns the number of
    /// seconds remaining on any prior alarm.
    pub fn alarm(self: &Arc<Self>, seconds: u32) -> u32 {
        let mut slot = self.alarm_timer.lock().unwrap();

        let remaining = if let Some((handle, _)) = slot.as_ref() {
            ticks_to_seconds(timer_stop(&self.process, *handle).unwrap_or(0))
        } else {
            0
        };

        if seconds > 0 {
            if slot.is_none() {
                let handle = timer_create(&self.process);
                let object = self.process.handles.get(handle).expect("just inserted");
                *slot = Some((handle, object));
            }
            let (handle, object) = slot.as_ref().unwrap();
            let ticks = seconds as u64 * ticks_per_second();
            let _ = timer_start(&self.process, *handle, ticks);

            if let Some(timer) = object.as_any().downcast_ref::<Timer>() {
                let weak_self = Arc::downgrade(self);
                timer.on_fire(Box::new(move || {
                    if let Some(this) = weak_self.upgrade() {
                        this.send_signal(SIGALRM, this.pid, 0);
                    }
                }));
            }
        } else if let Some((handle, _)) = slot.take() {
            let _ = self.process.handles.close(handle);
        }

        remaining
    }
}
