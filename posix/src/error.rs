//! Kernel-status-to-`errno` mapping (spec §7: "The POSIX service maps
//! kernel statuses onto POSIX `errno` values at the reply boundary") plus
//! the service's own wire-decode error type, grounded in
//! `examples/original_source/source/services/posix_service/process.cpp`'s
//! per-handler `replyData->err = EINVAL`/`ESRCH`/... assignments, centralized
//! here into one table rather than repeated inline at every handler.

use kernel::Status;

/// A POSIX `errno` value, as carried in every reply's `err` field.
pub type Errno = i32;

pub const EINVAL: Errno = 22;
pub const EPERM: Errno = 1;
pub const ESRCH: Errno = 3;
pub const EAGAIN: Errno = 11;
pub const ENOMEM: Errno = 12;
pub const EEXIST: Errno = 17;
pub const ENOSYS: Errno = 38;
pub const ENXIO: Errno = 6;
pub const ETIMEDOUT: Errno = 110;
pub const EINTR: Errno = 4;
pub const EPIPE: Errno = 32;
pub const EIO: Errno = 5;

/// Translate a [`Status`] to the `errno` a POSIX client expects, per the
/// kernel's error taxonomy (spec §7).
pub fn to_errno(status: Status) -> Errno {
    match status {
        Status::Ok => 0,
        Status::InvalidArg => EINVAL,
        Status::AccessDenied => EPERM,
        Status::NotFound => ESRCH,
        Status::AlreadyExists => EEXIST,
        Status::NoMemory => ENOMEM,
        Status::WouldBlock => EAGAIN,
        Status::TimedOut => ETIMEDOUT,
        Status::Interrupted => EINTR,
        Status::ConnHungUp => EPIPE,
        Status::Corrupt => EIO,
        Status::NotSupported => ENOSYS,
        Status::InUse => EAGAIN,
        Status::TooSmall => EINVAL,
        Status::IncorrectType => EINVAL,
    }
}

/// Errors owned by this crate's own layers (wire decode, service plumbing),
/// distinct from the kernel's `Status` — converted to an `errno` at the
/// reply boundary via [`ServiceError::errno`], never smuggled through as a
/// `Status` itself.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
    #[error("unrecognised request id {0}")]
    UnknownRequest(u32),
    #[error("kernel operation failed: {0}")]
    Kernel(#[from] StatusError),
}

/// A thin wrapper so `Status` (which has no `std::error::Error` impl, being
/// a `no_std`-friendly C-like enum) can be threaded through `?` and
/// `#[from]` here without adding a dependency edge back from `kernel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StatusError(pub Status);

impl From<Status> for StatusError {
    fn from(status: Status) -> Self {
        StatusError(status)
    }
}

impl ServiceError {
    pub fn errno(&self) -> Errno {
        match self {
            ServiceError::MalformedRequest(_) => EINVAL,
            ServiceError::UnknownRequest(_) => EINVAL,
            ServiceError::Kernel(StatusError(status)) => to_errno(*status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_esrch() {
        assert_eq!(to_errno(Status::NotFound), ESRCH);
    }

    #[test]
    fn access_denied_maps_to_eperm() {
        assert_eq!(to_errno(Status::AccessDenied), EPERM);
    }

    #[test]
    fn ok_maps_to_zero() {
        assert_eq!(to_errno(Status::Ok), 0);
    }
}
