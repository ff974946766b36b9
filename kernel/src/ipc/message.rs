//! Kernel messages (spec §3): reference-counted envelopes sent over a
//! connection, grounded in `ipc_kmessage_t` in
//! `examples/original_source/source/kernel/ipc/ipc.c`.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::clock::Ticks;
use crate::handle::{KernelObject, Rights};
use crate::status::Status;
use crate::task::token::Token;

/// Upper bound on a message's attached data, mirroring the original's
/// `IPC_DATA_MAX`. The exact constant wasn't present in the filtered
/// original source pack; 16 KiB is a generous, round value consistent
/// with the connection queue depth below.
pub const IPC_DATA_MAX: usize = 16 * 1024;

/// Maximum number of messages queued at one endpoint before `send()`
/// blocks (absent `FORCE`), mirroring `IPC_QUEUE_MAX`.
pub const IPC_QUEUE_MAX: usize = 16;

macro_rules! bitflags_like {
    (
        pub struct $name:ident: $ty:ty {
            $(#[$meta:meta] const $flag:ident = $value:expr;)*
        }
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($ty);

        impl $name {
            $(#[$meta] pub const $flag: $name = $name($value);)*
            pub const NONE: $name = $name(0);

            pub fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

bitflags_like! {
    pub struct MessageFlags: u32 {
        /// Ignore the remote queue depth limit when sending.
        const FORCE = 1 << 0;
        /// Sleep interruptibly (by thread interrupt) while blocked.
        const INTERRUPTIBLE = 1 << 1;
        /// Snapshot the sender's security token into the message.
        const SECURITY = 1 << 2;
    }
}

/// A message in flight on a connection: a type/flags header, a data
/// buffer, at most one attached (transferrable) handle, and an optional
/// security snapshot.
pub struct KernelMessage {
    pub msg_type: u32,
    pub flags: MessageFlags,
    pub timestamp: Ticks,
    pub data: Vec<u8>,
    pub handle: Option<Arc<dyn KernelObject>>,
    pub security: Option<Arc<Token>>,
}

impl KernelMessage {
    pub fn new(msg_type: u32, flags: MessageFlags) -> Self {
        KernelMessage {
            msg_type,
            flags,
            timestamp: 0,
            data: Vec::new(),
            handle: None,
            security: None,
        }
    }

    /// Attach `data`, replacing anything previously attached.
    /// `Status::InvalidArg` if it exceeds [`IPC_DATA_MAX`].
    pub fn set_data(&mut self, data: Vec<u8>) -> Status {
        if data.len() > IPC_DATA_MAX {
            return Status::InvalidArg;
        }
        self.data = data;
        Status::Ok
    }

    /// Attach a handle. The handle must carry [`Rights::TRANSFERRABLE`]
    /// (checked by the caller via the owning process's handle table before
    /// this is called; enforced here too for defense in depth).
    pub fn set_handle(&mut self, object: Arc<dyn KernelObject>, rights: Rights) -> Status {
        if !rights.contains(Rights::TRANSFERRABLE) {
            return Status::AccessDenied;
        }
        self.handle = Some(object);
        Status::Ok
    }
}
