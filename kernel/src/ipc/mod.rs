//! IPC ports and connections (spec §3/§4.D): the kernel's sole
//! inter-process communication primitive. A process creates a [`Port`],
//! publishes a handle to it, and other processes open a [`Connection`] to
//! it; the owner accepts by [`Port::listen`]ing.

pub mod connection;
pub mod endpoint;
pub mod message;
pub mod port;

pub use connection::{Connection, ConnectionEndpoint, CLIENT, SERVER};
pub use endpoint::KernelEndpointOps;
pub use message::{KernelMessage, MessageFlags, IPC_DATA_MAX, IPC_QUEUE_MAX};
pub use port::Port;

use alloc::sync::{Arc, Weak};

use crate::clock::Ticks;
use crate::handle::{KernelObject, ObjectType, Rights};
use crate::status::Status;
use crate::task::process::Process;

fn port_from_handle(object: &Arc<dyn KernelObject>) -> Result<&Port, Status> {
    object.as_any().downcast_ref::<Port>().ok_or(Status::InvalidArg)
}

/// `kern_port_create` (spec §6): create a port owned by `process` and
/// install a handle to it in its own table.
pub fn port_create(process: &Arc<Process>) -> u32 {
    let port = Port::new(Arc::downgrade(process));
    process.handles.insert(port, Rights::TRANSFERRABLE)
}

/// `kern_port_listen` (spec §6): block on the port referred to by
/// `port_handle` in `process`'s table for the next connection attempt,
/// returning a handle to the server side on success.
pub fn port_listen(process: &Arc<Process>, port_handle: u32, timeout: Ticks) -> Result<u32, Status> {
    let object = process.handles.get_typed(port_handle, ObjectType::Port)?;
    let conn = port_from_handle(&object)?.listen(timeout)?;
    conn.accept(Arc::downgrade(process), None);
    let endpoint = ConnectionEndpoint::new(conn, SERVER);
    Ok(process.handles.insert(endpoint, Rights::TRANSFERRABLE))
}

/// `kern_connection_open` (spec §6): open a connection to the port
/// referred to by `port_handle` in `opener`'s table, or to `opener`'s root
/// port if `port_handle` is `None`. Blocks until accepted, cancelled, or
/// `timeout` elapses.
pub fn connection_open(
    opener: &Arc<Process>,
    port_handle: Option<u32>,
    timeout: Ticks,
) -> Result<u32, Status> {
    let port_object = match port_handle {
        Some(handle) => opener.handles.get_typed(handle, ObjectType::Port)?,
        None => opener.root_port().ok_or(Status::NotFound)?,
    };
    let port = port_from_handle(&port_object)?;

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

/// Create a connection for the kernel's own use (e.g. a kernel-side
/// service sitting behind a [`KernelEndpointOps`]), returning the kernel's
/// endpoint directly plus a handle to the user side installed in
/// `client`'s table.
pub fn kernel_connection_create(
    client: &Arc<Process>,
    ops: Option<Arc<dyn KernelEndpointOps>>,
) -> (Arc<ConnectionEndpoint>, u32) {
    let conn = Connection::new_setup(Arc::downgrade(client));
    conn.accept(Weak::new(), ops);
    let client_endpoint = ConnectionEndpoint::new(Arc::clone(&conn), CLIENT);
    let handle = client.handles.insert(client_endpoint, Rights::TRANSFERRABLE);
    let server_endpoint = ConnectionEndpoint::new(conn, SERVER);
    (server_endpoint, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::token::Token;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn create_listen_connect_round_trip() {
        let server = process(1);
        let client = process(2);

        let port_handle = port_create(&server);
        let port_obj = server.handles.get(port_handle).unwrap();
        // Model the port handle having been transferred to the client via
        // an earlier IPC message (out of scope here; just share the table
        // entry directly).
        let client_port_handle = client.handles.insert(port_obj, Rights::TRANSFERRABLE);

        let server2 = Arc::clone(&server);
        let handle = std::thread::spawn(move || port_listen(&server2, port_handle, crate::clock::NO_TIMEOUT));

        std::thread::sleep(std::time::Duration::from_millis(10));
        let client_conn_handle = connection_open(&client, Some(client_port_handle), crate::clock::NO_TIMEOUT);
        let server_conn_handle = handle.join().unwrap();

        assert!(client_conn_handle.is_ok());
        assert!(server_conn_handle.is_ok());
    }

    #[test]
    fn connection_open_without_owned_root_port_not_found() {
        let client = process(1);
        assert_eq!(connection_open(&client, None, 0), Err(Status::NotFound));
    }

    #[test]
    fn kernel_connection_send_reaches_server_endpoint() {
        let client = process(1);
        let (server_endpoint, client_handle) = kernel_connection_create(&client, None);
        let msg = Arc::new(KernelMessage::new(5, MessageFlags::NONE));
        let client_object = client.handles.get(client_handle).unwrap();
        let client_endpoint = client_object.as_any().downcast_ref::<ConnectionEndpoint>().unwrap();
        client_endpoint.send(msg, crate::clock::NO_TIMEOUT);
        let received = server_endpoint.receive(crate::clock::NO_TIMEOUT).unwrap();
        assert_eq!(received.msg_type, 5);
    }
}
