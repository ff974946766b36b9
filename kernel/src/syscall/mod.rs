//! The syscall facade (spec §6): thin, explicit-argument wrappers over the
//! kernel's object model. Each submodule covers one object family named in
//! the external-interfaces list; none of them own scheduling or a trap
//! boundary, since this crate doesn't model one — every function here takes
//! the calling process (and, where relevant, thread) as an explicit
//! parameter instead of reading it off a current-thread register.

pub mod condition;
pub mod device;
pub mod group;
pub mod handle;
pub mod ipc;
pub mod process;
pub mod thread;
pub mod timer;
pub mod wait;

pub use condition::{condition_create, condition_set};
pub use device::{device_attr, device_open, DeviceHandle};
pub use group::{
    process_group_add, process_group_create, process_group_enumerate, process_group_query,
    process_group_remove,
};
pub use handle::{handle_close, handle_duplicate};
pub use ipc::{
    connection_open, connection_open_remote, connection_receive, connection_receive_data,
    connection_receive_handle, connection_send, connection_status, port_create, port_listen,
};
pub use process::{
    process_access, process_clone, process_control, process_create, process_exec, process_exit,
    process_id, process_kill, process_open, process_port, process_security,
    process_set_exception_handler, process_set_token, process_status, process_token,
};
pub use thread::{
    thread_create, thread_exit, thread_id, thread_ipl, thread_kill, thread_open, thread_raise,
    thread_restore, thread_security, thread_set_exception_handler, thread_set_exception_stack,
    thread_set_ipl, thread_set_token, thread_sleep, thread_status, thread_token, thread_control,
};
pub use timer::{timer_check_all, timer_create, timer_start, timer_stop};
pub use wait::object_wait;
