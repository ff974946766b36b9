//! Cross-module round trip (spec §8): attach a handle to a message, send it
//! over a connection, receive it on the other end, and extract it via
//! `connection_receive_handle`. The extracted handle must refer to the same
//! kernel object the sender attached — exercised here with a real device
//! handle so the check is "does it read back the same attribute", not just
//! "is the handle table non-empty".

use std::sync::Arc;

use kernel::device::{Attribute, AttributeType, Tree};
use kernel::ipc::MessageFlags;
use kernel::syscall::{
    connection_open_remote, connection_receive_handle, connection_send, device_attr, device_open,
    port_create, port_listen,
};
use kernel::task::process::Process;
use kernel::task::token::Token;

fn process(pid: u64) -> Arc<Process> {
    Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
}

#[test]
fn device_handle_survives_ipc_transfer() {
    let tree = Arc::new(Tree::new());
    let root = tree.root();
    let node = tree
        .create(
            "disk0",
            &root,
            None,
            None,
            vec![(String::from("irq"), Attribute::U32(42))],
        )
        .unwrap();
    tree.publish(&node);

    let server = process(1);
    let client = process(2);
    let port_handle = port_create(&server);
    let port_obj = server.handles.get(port_handle).unwrap();
    server.set_root_port(port_obj);

    let server_for_listen = Arc::clone(&server);
    let listener =
        std::thread::spawn(move || port_listen(&server_for_listen, port_handle, kernel::clock::NO_TIMEOUT));
    std::thread::sleep(std::time::Duration::from_millis(10));
    let client_handle = connection_open_remote(&client, &server, kernel::clock::NO_TIMEOUT).unwrap();
    let server_handle = listener.join().unwrap().unwrap();

    let device_handle = device_open(&tree, &client, "/disk0").unwrap();
    assert_eq!(
        connection_send(
            &client,
            client_handle,
            1,
            MessageFlags::NONE,
            Vec::new(),
            Some(device_handle),
            kernel::clock::NO_TIMEOUT,
        ),
        kernel::Status::Ok
    );
    // The sender's own table entry moved to the message; it no longer owns it.
    assert!(client.handles.get(device_handle).is_none());

    let extracted = connection_receive_handle(&server, server_handle, kernel::clock::NO_TIMEOUT)
        .unwrap()
        .expect("message carried a handle");

    // Reading the attribute back through the extracted handle proves it's
    // the same node the sender opened, not merely some handle or other.
    let mut buf = [0u8; 4];
    let n = device_attr(&server, extracted, "irq", AttributeType::U32, &mut buf).unwrap();
    assert_eq!(n, 4);
    assert_eq!(u32::from_ne_bytes(buf), 42);

    assert_eq!(server.handles.close(extracted), kernel::Status::Ok);
    assert_eq!(tree.destroy(&node), kernel::Status::Ok);
}
