//! Per-process handle table (spec §6).
//!
//! Every kernel object a process can refer to (ports, connections,
//! processes, threads, tokens, process groups, ...) is reached through an
//! integer handle. Each object kind carries an `OBJECT_TYPE_*` tag; handles
//! may be marked [`Rights::TRANSFERRABLE`]. Closing a handle runs the
//! object's close callback; waiting for an object's events goes through its
//! [`crate::sync::Notifier`].

pub mod condition;

pub use condition::Condition;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::any::Any;

use crate::status::Status;
use crate::sync::mutex::Mutex;
use crate::sync::notifier::{Notifier, NotifierToken};

/// The kind of kernel object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectType {
    Port,
    Connection,
    Process,
    Thread,
    Token,
    ProcessGroup,
    Device,
    KernelMessage,
    Condition,
    Timer,
}

bitflags_mod::bitflags! {
    /// Rights a handle carries, independent of the object it refers to.
    pub struct Rights: u32 {
        /// May be attached to an IPC message and handed to another process.
        const TRANSFERRABLE = 1 << 0;
    }
}

/// Anything that can sit behind a handle.
pub trait KernelObject: Any + Send + Sync {
    fn object_type(&self) -> ObjectType;

    /// Run when the last handle referring to this object closes. Default:
    /// no-op, for objects whose teardown is driven by `Drop` instead.
    fn close(&self) {}

    /// The notifier callers can register against via `object_wait`. `None`
    /// for object kinds with no waitable events.
    fn notifier(&self) -> Option<&Notifier> {
        None
    }

    /// Downcast back to the concrete type behind a handle, once its
    /// `object_type()` has confirmed what that is.
    fn as_any(&self) -> &dyn Any;
}

struct Entry {
    object: Arc<dyn KernelObject>,
    rights: Rights,
}

struct TableInner {
    next: u32,
    entries: BTreeMap<u32, Entry>,
}

/// A process's table of open handles.
pub struct HandleTable {
    inner: Mutex<TableInner>,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable {
            inner: Mutex::new(TableInner {
                next: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Install `object` under a fresh handle value.
    pub fn insert(&self, object: Arc<dyn KernelObject>, rights: Rights) -> u32 {
        let mut inner = self.inner.lock();
        let handle = inner.next;
        inner.next += 1;
        inner.entries.insert(handle, Entry { object, rights });
        handle
    }

    pub fn get(&self, handle: u32) -> Option<Arc<dyn KernelObject>> {
        self.inner.lock().entries.get(&handle).map(|e| Arc::clone(&e.object))
    }

    pub fn get_typed(&self, handle: u32, expected: ObjectType) -> Result<Arc<dyn KernelObject>, Status> {
        let object = self.get(handle).ok_or(Status::InvalidArg)?;
        if object.object_type() != expected {
            return Err(Status::InvalidArg);
        }
        Ok(object)
    }

    pub fn is_transferrable(&self, handle: u32) -> bool {
        self.inner
            .lock()
            .entries
            .get(&handle)
            .map(|e| e.rights.contains(Rights::TRANSFERRABLE))
            .unwrap_or(false)
    }

    /// Close `handle`, running the underlying object's close callback.
    /// `InvalidArg` if the handle does not exist.
    pub fn close(&self, handle: u32) -> Status {
        let entry = self.inner.lock().entries.remove(&handle);
        match entry {
            Some(entry) => {
                entry.object.close();
                Status::Ok
            }
            None => Status::InvalidArg,
        }
    }

    /// Duplicate a handle: both point at the same object.
    pub fn duplicate(&self, handle: u32) -> Result<u32, Status> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get(&handle).ok_or(Status::InvalidArg)?;
        let new_entry = Entry {
            object: Arc::clone(&entry.object),
            rights: entry.rights,
        };
        let new_handle = inner.next;
        inner.next += 1;
        inner.entries.insert(new_handle, new_entry);
        Ok(new_handle)
    }

    /// Register `callback` against `handle`'s object notifier. `NotSupported`
    /// if the object kind has no waitable events.
    pub fn wait(&self, handle: u32, callback: Box<dyn FnOnce() + Send>) -> Result<NotifierToken, Status> {
        let object = self.get(handle).ok_or(Status::InvalidArg)?;
        // SAFETY-free: notifier's lifetime is tied to the Arc we hold, but
        // `register` only needs it for the duration of this call.
        let token = object
            .notifier()
            .ok_or(Status::NotSupported)?
            .register(callback);
        Ok(token)
    }

    pub fn unwait(&self, handle: u32, token: NotifierToken) -> Result<bool, Status> {
        let object = self.get(handle).ok_or(Status::InvalidArg)?;
        let notifier = object.notifier().ok_or(Status::NotSupported)?;
        Ok(notifier.cancel(token))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A tiny hand-rolled bitflags so this crate doesn't need the `bitflags`
/// crate just for one flag type.
mod bitflags_mod {
    macro_rules! bitflags {
        (
            $(#[$meta:meta])*
            pub struct $name:ident: $ty:ty {
                $(const $flag:ident = $value:expr;)*
            }
        ) => {
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name($ty);

            impl $name {
                $(pub const $flag: $name = $name($value);)*
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
    pub(crate) use bitflags;
}
