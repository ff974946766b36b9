//! Kernel core: slab allocator, device tree, handle table, process/thread
//! lifecycle, and IPC ports/connections.
//!
//! Built `no_std` for the real target; the `std` feature (always implied
//! by `cfg(test)`) swaps the synchronization backend in [`sync`] for
//! real blocking primitives so the crate is host-testable and so the
//! `posix` crate, which always runs hosted, gets real blocking semantics.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod clock;
pub mod device;
pub mod handle;
pub mod ipc;
pub mod slab;
pub mod status;
pub mod sync;
pub mod syscall;
pub mod task;

pub use status::Status;
