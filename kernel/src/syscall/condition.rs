//! `condition_create`/`condition_set` (spec §6): a handle-backed boolean
//! flag, generalized out of the POSIX service's signal-condition use (spec
//! §4.E) into its own kernel primitive so anything can hand a client a
//! pollable/waitable event without inventing a bespoke object kind.

use alloc::sync::Arc;

use crate::handle::{Condition, Rights};
use crate::status::Status;
use crate::task::process::Process;

pub fn condition_create(process: &Arc<Process>) -> u32 {
    let condition = Arc::new(Condition::new());
    process.handles.insert(condition, Rights::TRANSFERRABLE)
}

pub fn condition_set(process: &Arc<Process>, handle: u32, signalled: bool) -> Status {
    let object = match process.handles.get_typed(handle, crate::handle::ObjectType::Condition) {
        Ok(o) => o,
        Err(status) => return status,
    };
    match object.as_any().downcast_ref::<Condition>() {
        Some(condition) => {
            condition.set(signalled);
            Status::Ok
        }
        None => Status::InvalidArg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::wait::object_wait;
    use crate::task::token::Token;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn set_wakes_an_object_wait() {
        let p = process(1);
        let handle = condition_create(&p);
        let p2 = Arc::clone(&p);
        let waiter =
            std::thread::spawn(move || object_wait(&p2, handle, crate::clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(condition_set(&p, handle, true), Status::Ok);
        assert_eq!(waiter.join().unwrap(), Status::Ok);
    }

    #[test]
    fn wrong_handle_type_rejected() {
        let p = process(1);
        let port_handle = crate::ipc::port_create(&p);
        assert_eq!(condition_set(&p, port_handle, true), Status::InvalidArg);
    }
}
