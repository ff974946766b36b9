//! Processes, threads, and the scheduling-adjacent primitives around them
//! (spec §3/§4.C).

pub mod exit_status;
pub mod group;
pub mod process;
pub mod reaper;
pub mod thread;
pub mod token;
pub mod wait_queue;

pub use exit_status::{decode, encode, ExitReason};
pub use group::ProcessGroup;
pub use process::{Process, ProcessState};
pub use reaper::Reaper;
pub use thread::{Thread, ThreadInterrupt, ThreadRunState};
pub use token::{Token, PRIV_KERNEL};
pub use wait_queue::WaitQueue;
