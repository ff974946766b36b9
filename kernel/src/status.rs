//! Kernel status codes.
//!
//! Every fallible kernel operation returns a [`Status`] instead of unwinding;
//! see spec §7. The POSIX service (in the `posix` crate) maps these onto
//! POSIX `errno` values at its reply boundary.

/// Result of a fallible kernel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Status {
    /// The operation completed successfully.
    Ok,
    /// A parameter was malformed: invalid handle, out-of-range id, required
    /// value missing.
    InvalidArg,
    /// The caller's privilege or identity does not permit this operation.
    AccessDenied,
    /// The referent (process, node, handle, ...) does not exist.
    NotFound,
    /// The object already exists, or the operation conflicts with the
    /// object's current state.
    AlreadyExists,
    /// A reference count, a name, or a handle-table slot was exhausted.
    NoMemory,
    /// A non-blocking call could not make progress immediately.
    WouldBlock,
    /// A blocking call's deadline was reached before it could complete.
    TimedOut,
    /// An interruptible wait was interrupted by a thread interrupt.
    Interrupted,
    /// The remote end of a connection has closed.
    ConnHungUp,
    /// On-disk or on-wire data failed validation.
    Corrupt,
    /// The requested feature is a stub or explicitly unsupported.
    NotSupported,
    /// A destroy/close was attempted on an object still in use.
    InUse,
    /// A buffer supplied by the caller was too small for the result.
    TooSmall,
    /// An attribute lookup found the name but with the wrong type.
    IncorrectType,
}

impl Status {
    /// `true` for [`Status::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// `true` for anything other than [`Status::Ok`].
    pub fn is_err(self) -> bool {
        !self.is_ok()
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::InvalidArg => "invalid argument",
            Status::AccessDenied => "access denied",
            Status::NotFound => "not found",
            Status::AlreadyExists => "already exists",
            Status::NoMemory => "resource exhausted",
            Status::WouldBlock => "would block",
            Status::TimedOut => "timed out",
            Status::Interrupted => "interrupted",
            Status::ConnHungUp => "connection hung up",
            Status::Corrupt => "corrupt",
            Status::NotSupported => "not supported",
            Status::InUse => "in use",
            Status::TooSmall => "too small",
            Status::IncorrectType => "incorrect type",
        };
        f.write_str(s)
    }
}
