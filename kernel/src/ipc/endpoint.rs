//! Kernel-side endpoint hooks (spec §3's `Endpoint` definition; grounded in
//! `ipc_endpoint_ops_t` in `examples/original_source/source/kernel/ipc/ipc.c`).
//!
//! A normal endpoint is just one side of a [`crate::ipc::connection::Connection`]
//! held by a userspace process, which sends and receives through the queue.
//! A *kernel* endpoint instead delegates incoming sends straight to a
//! vtable, letting an in-kernel service answer a connection without a real
//! thread blocked in `receive()`.

use alloc::sync::Arc;

use crate::clock::Ticks;
use crate::ipc::message::{KernelMessage, MessageFlags};
use crate::status::Status;

/// Flag on an endpoint's outgoing side: drop anything sent to it instead of
/// queuing (spec's "messages sent to this endpoint are discarded").
pub const ENDPOINT_DROP: u32 = 1 << 0;

/// Hooks a kernel endpoint can provide in place of a real message queue.
pub trait KernelEndpointOps: Send + Sync {
    /// Called in place of queuing when a message arrives at this endpoint.
    fn receive(&self, msg: Arc<KernelMessage>, flags: MessageFlags, timeout: Ticks) -> Status;

    /// Called once, after the connection has fully closed.
    fn closed(&self) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::sync::mutex::Mutex;
    use alloc::vec::Vec;

    /// A trivial loopback kernel endpoint: records every message it
    /// receives instead of delegating anywhere.
    pub struct LoopbackEndpoint {
        pub received: Mutex<Vec<Arc<KernelMessage>>>,
    }

    impl LoopbackEndpoint {
        pub fn new() -> Arc<Self> {
            Arc::new(LoopbackEndpoint {
                received: Mutex::new(Vec::new()),
            })
        }
    }

    impl KernelEndpointOps for LoopbackEndpoint {
        fn receive(&self, msg: Arc<KernelMessage>, _flags: MessageFlags, _timeout: Ticks) -> Status {
            self.received.lock().push(msg);
            Status::Ok
        }
    }
}
