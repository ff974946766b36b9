//! POSIX process groups (spec §4.E), grounded in
//! `examples/original_source/source/services/posix_service/process_group.{h,cpp}`.
//!
//! The membership set itself lives in the kernel (`kernel::task::group`,
//! reached through `kernel::syscall::group`); this is the thin POSIX-level
//! record pairing a group id with the session it belongs to, the way the
//! original's `ProcessGroup` pairs a kernel group handle with a `Session *`.

/// A process group: its kernel gpid, the session it belongs to, and the
/// pid of the process that created it. POSIX identifies a group by its
/// leader's pid (`getpgid() == getpid()` for a group leader); the kernel's
/// gpid is allocated from its own counter, so this is tracked separately
/// rather than assumed equal to the gpid.
pub struct PosixGroup {
    pub gpid: u64,
    pub sid: u64,
    pub leader_pid: u64,
}

impl PosixGroup {
    pub fn new(gpid: u64, sid: u64, leader_pid: u64) -> Self {
        PosixGroup { gpid, sid, leader_pid }
    }
}
