//! The POSIX compatibility service's entry point: owns a root port and
//! hands off to [`PosixService::run`] to accept connections and serve
//! spec §4.E's request protocol on each until it hangs up.

use std::sync::Arc;

use kernel::syscall::{port_create, process_create};
use kernel::task::token::{Token, PRIV_KERNEL};

use posix::config::ServiceConfig;
use posix::service::PosixService;

fn main() {
    env_logger::init();

    let config = ServiceConfig::from_env_and_args(std::env::args().skip(1));

    let token = Arc::new(Token::new(0, 0, PRIV_KERNEL));
    let service_process = process_create("posixd".into(), token);
    let port_handle = port_create(&service_process);
    let port_object = service_process.handles.get(port_handle).expect("just created");
    service_process.set_root_port(port_object);

    let service = PosixService::new(Arc::clone(&service_process), &config);

    kernel::clock::spawn_ticker();
    service.run(service_process, port_handle);
}
