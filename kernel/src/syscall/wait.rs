//! `object_wait` (spec §6): block the caller until the object behind a
//! handle fires its notifier, or `timeout` ticks elapse.
//!
//! Built on [`HandleTable::wait`]/`unwait` (the non-blocking callback-based
//! primitive spec §6 calls "event notifiers") plus a throwaway
//! [`WaitQueue`] to turn that callback into a sleep — the same pattern
//! `Thread::sleep` uses internally, just parked on the handle's notifier
//! instead of the thread's own wake source.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::clock::Ticks;
use crate::status::Status;
use crate::task::process::Process;
use crate::task::wait_queue::WaitQueue;

pub fn object_wait(process: &Arc<Process>, handle: u32, timeout: Ticks) -> Status {
    let wq = Arc::new(WaitQueue::new());
    let wq2 = Arc::clone(&wq);
    let token = match process.handles.wait(handle, Box::new(move || wq2.wake_all())) {
        Ok(token) => token,
        Err(status) => return status,
    };

    let status = wq.sleep(timeout, || false);
    if status != Status::Ok {
        let _ = process.handles.unwait(handle, token);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Rights;
    use crate::ipc;
    use crate::task::token::Token;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn wakes_when_port_gets_a_connection_attempt() {
        let server = process(1);
        let port_handle = ipc::port_create(&server);
        let server2 = Arc::clone(&server);
        let handle =
            std::thread::spawn(move || object_wait(&server2, port_handle, crate::clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));

        let client = process(2);
        let port_obj = server.handles.get(port_handle).unwrap();
        let client_port_handle = client.handles.insert(port_obj, Rights::TRANSFERRABLE);
        let _ = ipc::connection_open(&client, Some(client_port_handle), 0);

        assert_eq!(handle.join().unwrap(), Status::Ok);
    }

    #[test]
    fn times_out_with_nothing_to_wait_for() {
        let server = process(1);
        let port_handle = ipc::port_create(&server);
        assert_eq!(object_wait(&server, port_handle, 1), Status::TimedOut);
    }

    #[test]
    fn unknown_handle_is_invalid_arg() {
        let p = process(1);
        assert_eq!(object_wait(&p, 999, 0), Status::InvalidArg);
    }
}
