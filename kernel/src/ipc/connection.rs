//! Connections (spec §3/§4.D): a two-endpoint pipe of [`KernelMessage`]s,
//! grounded in `ipc_connection_t`/`ipc_endpoint_t` in
//! `examples/original_source/source/kernel/ipc/ipc.c`. One `Mutex` guards
//! the whole connection (both endpoints), matching the original's single
//! `conn->lock` — there is no reason to split it finer here.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};

use crate::clock::{self, Ticks};
use crate::handle::{KernelObject, ObjectType};
use crate::ipc::endpoint::{KernelEndpointOps, ENDPOINT_DROP};
use crate::ipc::message::{KernelMessage, MessageFlags, IPC_QUEUE_MAX};
use crate::status::Status;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;
use crate::sync::notifier::Notifier;
use crate::task::process::Process;

pub const SERVER: usize = 0;
pub const CLIENT: usize = 1;

fn other(side: usize) -> usize {
    1 - side
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Setup,
    Active,
    Closed,
}

struct Side {
    flags: u32,
    process: Option<Weak<Process>>,
    ops: Option<Arc<dyn KernelEndpointOps>>,
    messages: VecDeque<Arc<KernelMessage>>,
}

impl Side {
    fn new() -> Self {
        Side {
            flags: 0,
            process: None,
            ops: None,
            messages: VecDeque::new(),
        }
    }
}

struct Inner {
    state: ConnState,
    sides: [Side; 2],
}

/// A live connection between two endpoints. Held by two handles (one per
/// side) plus, while in `Setup`, a reference from the owning port's
/// waiting list.
pub struct Connection {
    inner: Mutex<Inner>,
    open_cvar: Condvar,
    space_cvar: [Condvar; 2],
    data_cvar: [Condvar; 2],
    activity_notifier: [Notifier; 2],
}

impl Connection {
    /// A client opening a connection starts it in `Setup`; the server side
    /// is filled in by [`Connection::accept`] once a listener picks it up.
    pub fn new_setup(client_process: Weak<Process>) -> Arc<Connection> {
        let mut sides = [Side::new(), Side::new()];
        sides[CLIENT].process = Some(client_process);
        Arc::new(Connection {
            inner: Mutex::new(Inner {
                state: ConnState::Setup,
                sides,
            }),
            open_cvar: Condvar::new(),
            space_cvar: [Condvar::new(), Condvar::new()],
            data_cvar: [Condvar::new(), Condvar::new()],
            activity_notifier: [Notifier::new(), Notifier::new()],
        })
    }

    pub fn notifier_for(&self, side: usize) -> &Notifier {
        &self.activity_notifier[side]
    }

    pub fn is_hung_up(&self) -> bool {
        self.inner.lock().state == ConnState::Closed
    }

    pub fn set_drop(&self, side: usize, drop_messages: bool) {
        let mut inner = self.inner.lock();
        if drop_messages {
            inner.sides[side].flags |= ENDPOINT_DROP;
        } else {
            inner.sides[side].flags &= !ENDPOINT_DROP;
        }
    }

    /// Accept the connection: fill in the server side and move `Setup` to
    /// `Active`, waking the client blocked in [`Connection::wait_open`].
    pub fn accept(&self, server_process: Weak<Process>, ops: Option<Arc<dyn KernelEndpointOps>>) {
        let mut inner = self.inner.lock();
        inner.sides[SERVER].process = Some(server_process);
        inner.sides[SERVER].ops = ops;
        inner.state = ConnState::Active;
        drop(inner);
        self.open_cvar.notify_all();
    }

    /// The port this connection was queued on was disowned or destroyed
    /// before a listener accepted it.
    pub fn cancel_setup(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnState::Setup {
            inner.state = ConnState::Closed;
        }
        drop(inner);
        self.open_cvar.notify_all();
    }

    /// Client side: block until the connection is accepted or cancelled.
    pub fn wait_open(&self, timeout: Ticks) -> Status {
        let deadline = clock::deadline(timeout);
        let mut guard = self.inner.lock();
        loop {
            match guard.state {
                ConnState::Active => return Status::Ok,
                ConnState::Closed => return Status::ConnHungUp,
                ConnState::Setup => {}
            }
            if timeout == 0 {
                return Status::WouldBlock;
            }
            let (g, status) = self.open_cvar.wait_until(guard, deadline);
            guard = g;
            if guard.state == ConnState::Setup && status == Status::TimedOut {
                return Status::TimedOut;
            }
        }
    }

    /// Queue `msg` for the side opposite `from`. Blocks while that side's
    /// queue is full unless the message carries [`MessageFlags::FORCE`], or
    /// delegates straight to a kernel endpoint's [`KernelEndpointOps::receive`]
    /// if the remote side is kernel-owned.
    pub fn send(&self, from: usize, msg: Arc<KernelMessage>, timeout: Ticks) -> Status {
        let to = other(from);
        let mut guard = self.inner.lock();

        if guard.state == ConnState::Closed {
            return Status::ConnHungUp;
        }
        if guard.sides[to].flags & ENDPOINT_DROP != 0 {
            return Status::Ok;
        }
        if let Some(ops) = guard.sides[to].ops.clone() {
            let flags = msg.flags;
            drop(guard);
            return ops.receive(msg, flags, timeout);
        }

        let force = msg.flags.contains(MessageFlags::FORCE);
        if !force {
            let deadline = clock::deadline(timeout);
            loop {
                if guard.sides[to].messages.len() < IPC_QUEUE_MAX {
                    break;
                }
                if guard.state == ConnState::Closed {
                    return Status::ConnHungUp;
                }
                if timeout == 0 {
                    return Status::WouldBlock;
                }
                let (g, status) = self.space_cvar[to].wait_until(guard, deadline);
                guard = g;
                if guard.state == ConnState::Closed {
                    return Status::ConnHungUp;
                }
                if status == Status::TimedOut && guard.sides[to].messages.len() >= IPC_QUEUE_MAX {
                    return Status::TimedOut;
                }
            }
        }

        guard.sides[to].messages.push_back(msg);
        drop(guard);
        self.activity_notifier[to].fire();
        self.data_cvar[to].notify_one();
        Status::Ok
    }

    /// Wait for and pop the next message queued at `side`.
    pub fn receive(&self, side: usize, timeout: Ticks) -> Result<Arc<KernelMessage>, Status> {
        let deadline = clock::deadline(timeout);
        let mut guard = self.inner.lock();
        loop {
            if let Some(msg) = guard.sides[side].messages.pop_front() {
                drop(guard);
                self.space_cvar[side].notify_one();
                return Ok(msg);
            }
            if guard.state == ConnState::Closed {
                return Err(Status::ConnHungUp);
            }
            if timeout == 0 {
                return Err(Status::WouldBlock);
            }
            let (g, status) = self.data_cvar[side].wait_until(guard, deadline);
            guard = g;
            if guard.state == ConnState::Closed && guard.sides[side].messages.is_empty() {
                return Err(Status::ConnHungUp);
            }
            if status == Status::TimedOut && guard.sides[side].messages.is_empty() {
                return Err(Status::TimedOut);
            }
        }
    }

    /// Close `side`'s end: mark the connection `Closed`, empty both queues,
    /// wake every waiter, and fire the *remote* side's activity notifier
    /// exactly once (spec's "closing one endpoint ... fires the remote
    /// hangup notifier exactly once").
    pub fn close(&self, from: usize) {
        let to = other(from);
        let mut guard = self.inner.lock();
        if guard.state == ConnState::Closed {
            return;
        }
        let was_active = guard.state == ConnState::Active;
        guard.state = ConnState::Closed;
        guard.sides[SERVER].messages.clear();
        guard.sides[CLIENT].messages.clear();
        let remote_ops = guard.sides[to].ops.clone();
        guard.sides[from].process = None;
        drop(guard);

        if was_active {
            self.activity_notifier[to].fire();
        }
        self.open_cvar.notify_all();
        self.space_cvar[SERVER].notify_all();
        self.space_cvar[CLIENT].notify_all();
        self.data_cvar[SERVER].notify_all();
        self.data_cvar[CLIENT].notify_all();

        if let Some(ops) = remote_ops {
            ops.closed();
        }
    }
}

/// A process's handle to one side of a [`Connection`].
pub struct ConnectionEndpoint {
    connection: Arc<Connection>,
    side: usize,
}

impl ConnectionEndpoint {
    pub fn new(connection: Arc<Connection>, side: usize) -> Arc<ConnectionEndpoint> {
        Arc::new(ConnectionEndpoint { connection, side })
    }

    pub fn send(&self, msg: Arc<KernelMessage>, timeout: Ticks) -> Status {
        self.connection.send(self.side, msg, timeout)
    }

    pub fn receive(&self, timeout: Ticks) -> Result<Arc<KernelMessage>, Status> {
        self.connection.receive(self.side, timeout)
    }

    pub fn is_hung_up(&self) -> bool {
        self.connection.is_hung_up()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl KernelObject for ConnectionEndpoint {
    fn object_type(&self) -> ObjectType {
        ObjectType::Connection
    }

    fn close(&self) {
        self.connection.close(self.side);
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(self.connection.notifier_for(self.side))
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::endpoint::test_support::LoopbackEndpoint;
    use crate::ipc::message::MessageFlags;

    #[test]
    fn accept_wakes_waiting_client() {
        let conn = Connection::new_setup(Weak::new());
        let conn2 = Arc::clone(&conn);
        let handle = std::thread::spawn(move || conn2.wait_open(clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        conn.accept(Weak::new(), None);
        assert_eq!(handle.join().unwrap(), Status::Ok);
    }

    #[test]
    fn cancel_setup_reports_hung_up_to_waiting_client() {
        let conn = Connection::new_setup(Weak::new());
        let conn2 = Arc::clone(&conn);
        let handle = std::thread::spawn(move || conn2.wait_open(clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        conn.cancel_setup();
        assert_eq!(handle.join().unwrap(), Status::ConnHungUp);
    }

    #[test]
    fn send_then_receive_round_trip() {
        let conn = Connection::new_setup(Weak::new());
        conn.accept(Weak::new(), None);
        let mut msg = KernelMessage::new(1, MessageFlags::NONE);
        msg.set_data(alloc::vec![1, 2, 3]);
        assert_eq!(conn.send(CLIENT, Arc::new(msg), clock::NO_TIMEOUT), Status::Ok);
        let received = conn.receive(SERVER, clock::NO_TIMEOUT).unwrap();
        assert_eq!(received.data, alloc::vec![1, 2, 3]);
    }

    #[test]
    fn close_hangs_up_remote_and_drains_queues() {
        let conn = Connection::new_setup(Weak::new());
        conn.accept(Weak::new(), None);
        let msg = Arc::new(KernelMessage::new(1, MessageFlags::NONE));
        conn.send(CLIENT, msg, clock::NO_TIMEOUT);
        conn.close(CLIENT);
        assert!(conn.is_hung_up());
        assert_eq!(conn.receive(SERVER, 0), Err(Status::ConnHungUp));
        assert_eq!(conn.send(SERVER, Arc::new(KernelMessage::new(1, MessageFlags::NONE)), 0), Status::ConnHungUp);
    }

    #[test]
    fn receive_blocks_then_wakes_on_send() {
        let conn = Connection::new_setup(Weak::new());
        conn.accept(Weak::new(), None);
        let conn2 = Arc::clone(&conn);
        let handle = std::thread::spawn(move || conn2.receive(SERVER, clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));
        conn.send(CLIENT, Arc::new(KernelMessage::new(7, MessageFlags::NONE)), clock::NO_TIMEOUT);
        assert_eq!(handle.join().unwrap().unwrap().msg_type, 7);
    }

    #[test]
    fn send_delegates_to_kernel_endpoint_ops() {
        let conn = Connection::new_setup(Weak::new());
        let loopback = LoopbackEndpoint::new();
        conn.accept(Weak::new(), Some(Arc::clone(&loopback) as Arc<dyn KernelEndpointOps>));
        conn.send(CLIENT, Arc::new(KernelMessage::new(9, MessageFlags::NONE)), clock::NO_TIMEOUT);
        assert_eq!(loopback.received.lock().len(), 1);
    }

    #[test]
    fn force_flag_bypasses_full_queue() {
        let conn = Connection::new_setup(Weak::new());
        conn.accept(Weak::new(), None);
        for _ in 0..IPC_QUEUE_MAX {
            conn.send(CLIENT, Arc::new(KernelMessage::new(0, MessageFlags::NONE)), clock::NO_TIMEOUT);
        }
        assert_eq!(conn.send(CLIENT, Arc::new(KernelMessage::new(0, MessageFlags::NONE)), 0), Status::WouldBlock);
        assert_eq!(conn.send(CLIENT, Arc::new(KernelMessage::new(0, MessageFlags::FORCE)), 0), Status::Ok);
    }
}
