//! `timer_create`/`start`/`stop` (spec §6): a handle-backed one-shot timer,
//! the same primitive the POSIX service's `ALARM` request arms directly
//! (spec §4.E).

use alloc::sync::Arc;

use crate::clock::Ticks;
use crate::handle::{ObjectType, Rights};
use crate::status::Status;
use crate::sync::timer::{Timer, TimerWheel};
use crate::task::process::Process;

static TIMER_WHEEL: TimerWheel = TimerWheel::new();

pub fn timer_create(process: &Arc<Process>) -> u32 {
    let timer = Arc::new(Timer::new());
    TIMER_WHEEL.track(Arc::clone(&timer));
    process.handles.insert(timer, Rights::TRANSFERRABLE)
}

/// Sweep every timer ever created through [`timer_create`], firing any that
/// have passed their deadline. Driven once per tick by whatever advances
/// [`crate::clock`] — the `std` ticker thread in hosted builds, a real timer
/// IRQ on hardware.
pub fn timer_check_all() {
    TIMER_WHEEL.check_all();
}

fn timer_from_handle(process: &Arc<Process>, handle: u32) -> Result<Arc<dyn crate::handle::KernelObject>, Status> {
    process.handles.get_typed(handle, ObjectType::Timer)
}

/// `timer_start`: (re)arm the timer for `ticks` from now. Returns the
/// ticks remaining on any previous deadline, mirroring `alarm()`.
pub fn timer_start(process: &Arc<Process>, handle: u32, ticks: Ticks) -> Result<Ticks, Status> {
    let object = timer_from_handle(process, handle)?;
    let timer = object.as_any().downcast_ref::<Timer>().ok_or(Status::InvalidArg)?;
    Ok(timer.set(ticks))
}

/// `timer_stop`: cancel any pending deadline. Returns the ticks that were
/// remaining, or `0` if it wasn't armed.
pub fn timer_stop(process: &Arc<Process>, handle: u32) -> Result<Ticks, Status> {
    timer_start(process, handle, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::syscall::wait::object_wait;
    use crate::task::token::Token;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn start_then_stop_reports_remaining() {
        let p = process(1);
        let handle = timer_create(&p);
        timer_start(&p, handle, 100).unwrap();
        let remaining = timer_stop(&p, handle).unwrap();
        assert!(remaining > 0);
    }

    #[test]
    fn fire_wakes_object_wait() {
        let p = process(1);
        let handle = timer_create(&p);
        timer_start(&p, handle, 1).unwrap();

        let object = p.handles.get(handle).unwrap();
        let timer = object.as_any().downcast_ref::<crate::sync::timer::Timer>().unwrap();

        let p2 = Arc::clone(&p);
        let waiter = std::thread::spawn(move || object_wait(&p2, handle, clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        clock::advance(1);
        assert!(timer.check());
        assert_eq!(waiter.join().unwrap(), Status::Ok);
    }
}
