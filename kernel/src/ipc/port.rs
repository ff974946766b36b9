//! Ports (spec §3/§4.D): a named point of connection owned by one process,
//! grounded in `ipc_port_t` in
//! `examples/original_source/source/kernel/ipc/ipc.c`.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};

use crate::clock::{self, Ticks};
use crate::handle::{KernelObject, ObjectType};
use crate::ipc::connection::Connection;
use crate::status::Status;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;
use crate::sync::notifier::Notifier;
use crate::task::process::Process;

pub struct Port {
    owner: Mutex<Option<Weak<Process>>>,
    waiting: Mutex<VecDeque<Arc<Connection>>>,
    listen_cvar: Condvar,
    connection_notifier: Notifier,
}

impl Port {
    pub fn new(owner: Weak<Process>) -> Arc<Port> {
        Arc::new(Port {
            owner: Mutex::new(Some(owner)),
            waiting: Mutex::new(VecDeque::new()),
            listen_cvar: Condvar::new(),
            connection_notifier: Notifier::new(),
        })
    }

    pub fn is_owned(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Disown the port: no further connections can be listened for on it.
    /// Any connections still waiting to be accepted are cancelled (spec's
    /// "a process's ports are disowned when it dies"). Existing `Active`
    /// connections are unaffected — they have no relation to the port once
    /// accepted.
    pub fn disown(&self) {
        *self.owner.lock() = None;
        let waiting: alloc::vec::Vec<_> = self.waiting.lock().drain(..).collect();
        for conn in waiting {
            conn.cancel_setup();
        }
    }

    /// Queue a connection attempt, waking one listener.
    pub fn enqueue(&self, conn: Arc<Connection>) -> Status {
        if !self.is_owned() {
            return Status::ConnHungUp;
        }
        self.waiting.lock().push_back(conn);
        self.listen_cvar.notify_one();
        self.connection_notifier.fire();
        Status::Ok
    }

    /// Block until a connection attempt arrives, or `timeout` elapses.
    pub fn listen(&self, timeout: Ticks) -> Result<Arc<Connection>, Status> {
        let deadline = clock::deadline(timeout);
        let mut guard = self.waiting.lock();
        loop {
            if let Some(conn) = guard.pop_front() {
                return Ok(conn);
            }
            if timeout == 0 {
                return Err(Status::WouldBlock);
            }
            let (g, status) = self.listen_cvar.wait_until(guard, deadline);
            guard = g;
            if status == Status::TimedOut && guard.is_empty() {
                return Err(Status::TimedOut);
            }
        }
    }
}

impl KernelObject for Port {
    fn object_type(&self) -> ObjectType {
        ObjectType::Port
    }

    fn close(&self) {
        self.disown();
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.connection_notifier)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_returns_queued_connection() {
        let port = Port::new(Weak::new());
        let conn = Connection::new_setup(Weak::new());
        port.enqueue(Arc::clone(&conn));
        let accepted = port.listen(clock::NO_TIMEOUT).unwrap();
        assert!(Arc::ptr_eq(&accepted, &conn));
    }

    #[test]
    fn listen_times_out_with_nothing_queued() {
        let port = Port::new(Weak::new());
        assert_eq!(port.listen(0), Err(Status::WouldBlock));
    }

    #[test]
    fn disown_cancels_waiting_connections() {
        let port = Port::new(Weak::new());
        let conn = Connection::new_setup(Weak::new());
        port.enqueue(Arc::clone(&conn));
        port.disown();
        assert_eq!(conn.wait_open(0), Status::ConnHungUp);
        assert_eq!(port.enqueue(Connection::new_setup(Weak::new())), Status::ConnHungUp);
    }

    #[test]
    fn listen_blocks_then_wakes_on_enqueue() {
        let port = Port::new(Weak::new());
        let port2 = Arc::clone(&port);
        let handle = std::thread::spawn(move || port2.listen(clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        let conn = Connection::new_setup(Weak::new());
        port.enqueue(Arc::clone(&conn));
        let accepted = handle.join().unwrap().unwrap();
        assert!(Arc::ptr_eq(&accepted, &conn));
    }
}
