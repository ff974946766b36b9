//! `connection_*` syscalls (spec §6): everything `kernel::ipc` exposes as
//! `Arc`-typed operations, re-shaped to work from a process + a handle
//! number the way a real syscall entry point would see them.
//!
//! `receive_data`/`receive_handle` are simplified relative to spec §4.D's
//! "pending attachment slot" (a received message retained so data and
//! handle can be fetched by separate follow-up calls): each call here pops
//! its own message off the queue instead of sharing one retained message.
//! A caller that wants both a message's data and its handle uses
//! [`connection_receive`] directly and reads both fields off the one
//! [`KernelMessage`] it gets back.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::clock::Ticks;
use crate::handle::{ObjectType, Rights};
use crate::ipc::{Connection, ConnectionEndpoint, KernelMessage, MessageFlags, Port, CLIENT};
use crate::status::Status;
use crate::task::process::Process;

pub use crate::ipc::{connection_open, port_create, port_listen};

fn endpoint_from_handle(
    process: &Arc<Process>,
    handle: u32,
) -> Result<Arc<dyn crate::handle::KernelObject>, Status> {
    process.handles.get_typed(handle, ObjectType::Connection)
}

/// `connection_open_remote`: open a connection directly to `target`'s root
/// port, bypassing `opener`'s own handle table (unlike [`connection_open`],
/// which only reaches a port `opener` already holds a handle to or its own
/// root port).
pub fn connection_open_remote(
    opener: &Arc<Process>,
    target: &Arc<Process>,
    timeout: Ticks,
) -> Result<u32, Status> {
    let port_object = target.root_port().ok_or(Status::NotFound)?;
    let port = port_object.as_any().downcast_ref::<Port>().ok_or(Status::InvalidArg)?;
    if !port.is_owned() {
        return Err(Status::ConnHungUp);
    }

    let conn = Connection::new_setup(Arc::downgrade(opener));
    let enqueue_status = port.enqueue(Arc::clone(&conn));
    if enqueue_status != Status::Ok {
        return Err(enqueue_status);
    }

    let status = conn.wait_open(timeout);
    if status != Status::Ok {
        conn.close(CLIENT);
        return Err(status);
    }

    let endpoint = ConnectionEndpoint::new(conn, CLIENT);
    Ok(opener.handles.insert(endpoint, Rights::TRANSFERRABLE))
}

/// `connection_send`: build a message from raw parts and send it. A handle
/// attached via `attached_handle` must carry [`Rights::TRANSFERRABLE`] and
/// is closed in the sender's table on success, modelling the handle moving
/// to the remote.
pub fn connection_send(
    process: &Arc<Process>,
    handle: u32,
    msg_type: u32,
    flags: MessageFlags,
    data: Vec<u8>,
    attached_handle: Option<u32>,
    timeout: Ticks,
) -> Status {
    let object = match endpoint_from_handle(process, handle) {
        Ok(o) => o,
        Err(status) => return status,
    };
    let endpoint = match object.as_any().downcast_ref::<ConnectionEndpoint>() {
        Some(e) => e,
        None => return Status::InvalidArg,
    };

    let mut message = KernelMessage::new(msg_type, flags);
    if flags.contains(MessageFlags::SECURITY) {
        message.security = Some(process.token());
    }
    let data_status = message.set_data(data);
    if data_status != Status::Ok {
        return data_status;
    }

    if let Some(attached) = attached_handle {
        if !process.handles.is_transferrable(attached) {
            return Status::AccessDenied;
        }
        let attached_object = match process.handles.get(attached) {
            Some(o) => o,
            None => return Status::InvalidArg,
        };
        let handle_status = message.set_handle(attached_object, Rights::TRANSFERRABLE);
        if handle_status != Status::Ok {
            return handle_status;
        }
        process.handles.close(attached);
    }

    endpoint.send(Arc::new(message), timeout)
}

/// `connection_receive`: pop and return the next message queued for this
/// endpoint.
pub fn connection_receive(
    process: &Arc<Process>,
    handle: u32,
    timeout: Ticks,
) -> Result<Arc<KernelMessage>, Status> {
    let object = endpoint_from_handle(process, handle)?;
    let endpoint = object
        .as_any()
        .downcast_ref::<ConnectionEndpoint>()
        .ok_or(Status::InvalidArg)?;
    endpoint.receive(timeout)
}

/// `connection_receive_data`: like [`connection_receive`] but returns only
/// the data buffer.
pub fn connection_receive_data(
    process: &Arc<Process>,
    handle: u32,
    timeout: Ticks,
) -> Result<Vec<u8>, Status> {
    connection_receive(process, handle, timeout).map(|msg| msg.data.clone())
}

/// `connection_receive_handle`: like [`connection_receive`] but installs
/// any attached handle into `process`'s table and returns that handle
/// number, or `None` if the message carried none.
pub fn connection_receive_handle(
    process: &Arc<Process>,
    handle: u32,
    timeout: Ticks,
) -> Result<Option<u32>, Status> {
    let msg = connection_receive(process, handle, timeout)?;
    Ok(msg
        .handle
        .as_ref()
        .map(|object| process.handles.insert(Arc::clone(object), Rights::TRANSFERRABLE)))
}

/// `connection_status`: `true` if the remote end has hung up.
pub fn connection_status(process: &Arc<Process>, handle: u32) -> Result<bool, Status> {
    let object = endpoint_from_handle(process, handle)?;
    let endpoint = object
        .as_any()
        .downcast_ref::<ConnectionEndpoint>()
        .ok_or(Status::InvalidArg)?;
    Ok(endpoint.is_hung_up())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::token::Token;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn open_remote_reaches_target_root_port() {
        let server = process(1);
        let port_handle = port_create(&server);
        let port_obj = server.handles.get(port_handle).unwrap();
        server.set_root_port(port_obj);

        let client = process(2);
        let server2 = Arc::clone(&server);
        let listener =
            std::thread::spawn(move || port_listen(&server2, port_handle, crate::clock::NO_TIMEOUT));
        std::thread::sleep(std::time::Duration::from_millis(10));

        let client_handle =
            connection_open_remote(&client, &server, crate::clock::NO_TIMEOUT).unwrap();
        let server_handle = listener.join().unwrap().unwrap();

        assert_eq!(
            connection_send(&client, client_handle, 1, MessageFlags::NONE, alloc::vec![9], None, crate::clock::NO_TIMEOUT),
            Status::Ok
        );
        let data = connection_receive_data(&server, server_handle, crate::clock::NO_TIMEOUT).unwrap();
        assert_eq!(data, alloc::vec![9]);
    }

    #[test]
    fn send_transfers_attached_handle() {
        let client = process(1);
        let (server_endpoint, client_handle) = crate::ipc::kernel_connection_create(&client, None);

        let port_handle = port_create(&client);
        assert_eq!(
            connection_send(
                &client,
                client_handle,
                1,
                MessageFlags::NONE,
                Vec::new(),
                Some(port_handle),
                crate::clock::NO_TIMEOUT
            ),
            Status::Ok
        );
        assert!(client.handles.get(port_handle).is_none());

        let received = server_endpoint.receive(crate::clock::NO_TIMEOUT).unwrap();
        assert!(received.handle.is_some());
    }

    #[test]
    fn status_reports_hangup() {
        let client = process(1);
        let (_server_endpoint, client_handle) = crate::ipc::kernel_connection_create(&client, None);
        assert_eq!(connection_status(&client, client_handle), Ok(false));
        assert_eq!(client.handles.close(client_handle), Status::Ok);
    }
}
