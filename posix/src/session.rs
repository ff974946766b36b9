//! POSIX sessions (spec §4.E), grounded in
//! `examples/original_source/source/services/posix_service/session.{h,cpp}`.
//! A session tracks the process groups that belong to it and, for at most
//! one of them, a controlling terminal handle.

use std::sync::Mutex;

/// A session: a set of process groups sharing a controlling terminal. Its
/// id is the pid of the process that called `setsid()` to create it.
pub struct Session {
    pub sid: u64,
    groups: Mutex<Vec<u64>>,
    /// The controlling terminal, set once by the terminal service via
    /// `SET_SESSION_TERMINAL` (spec §4.E). Modeled as an opaque kernel
    /// handle number rather than a real file handle, since this workspace
    /// has no VFS/terminal driver (out of scope per spec §1).
    terminal: Mutex<Option<u32>>,
}

impl Session {
    pub fn new(sid: u64) -> Self {
        Session {
            sid,
            groups: Mutex::new(Vec::new()),
            terminal: Mutex::new(None),
        }
    }

    pub fn add_group(&self, gpid: u64) {
        let mut groups = self.groups.lock().unwrap();
        if !groups.contains(&gpid) {
            groups.push(gpid);
        }
    }

    /// Remove `gpid` from this session's group set. Returns `true` if this
    /// was the session's last group, i.e. the session itself is now dead
    /// (mirrors `Session::removeProcessGroup`'s "this destroys the
    /// Session" path).
    pub fn remove_group(&self, gpid: u64) -> bool {
        let mut groups = self.groups.lock().unwrap();
        groups.retain(|&g| g != gpid);
        groups.is_empty()
    }

    pub fn set_terminal(&self, handle: u32) {
        *self.terminal.lock().unwrap() = Some(handle);
    }

    pub fn terminal(&self) -> Option<u32> {
        *self.terminal.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_group_removed_reports_session_death() {
        let session = Session::new(1);
        session.add_group(1);
        session.add_group(2);
        assert!(!session.remove_group(1));
        assert!(session.remove_group(2));
    }

    #[test]
    fn terminal_round_trips() {
        let session = Session::new(1);
        assert_eq!(session.terminal(), None);
        session.set_terminal(42);
        assert_eq!(session.terminal(), Some(42));
    }
}
