//! POSIX compatibility service (spec §4.E): signals, process groups,
//! sessions, and controlling terminals implemented as a user-space
//! translator over `kernel`'s native primitives, grounded throughout in
//! `examples/original_source/source/services/posix_service/`.

pub mod config;
pub mod error;
pub mod group;
pub mod process;
pub mod protocol;
pub mod service;
pub mod session;
pub mod signal;

pub use config::ServiceConfig;
pub use error::{Errno, ServiceError};
pub use process::PosixProcess;
pub use service::PosixService;
