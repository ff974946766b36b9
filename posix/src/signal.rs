//! POSIX signal numbers, dispositions, and the default-action table (spec
//! §4.E), grounded in
//! `examples/original_source/source/services/posix_service/process.{h,cpp}`'s
//! `SignalState`/`defaultSignal`.

pub const NSIG: usize = 32;

pub const SIGHUP: u32 = 1;
pub const SIGINT: u32 = 2;
pub const SIGQUIT: u32 = 3;
pub const SIGILL: u32 = 4;
pub const SIGTRAP: u32 = 5;
pub const SIGABRT: u32 = 6;
pub const SIGBUS: u32 = 7;
pub const SIGFPE: u32 = 8;
pub const SIGKILL: u32 = 9;
pub const SIGUSR1: u32 = 10;
pub const SIGSEGV: u32 = 11;
pub const SIGUSR2: u32 = 12;
pub const SIGPIPE: u32 = 13;
pub const SIGALRM: u32 = 14;
pub const SIGTERM: u32 = 15;
pub const SIGCHLD: u32 = 17;
pub const SIGCONT: u32 = 18;
pub const SIGSTOP: u32 = 19;
pub const SIGTSTP: u32 = 20;
pub const SIGTTIN: u32 = 21;
pub const SIGTTOU: u32 = 22;
pub const SIGURG: u32 = 23;
pub const SIGWINCH: u32 = 28;

/// How a process wants a given signal handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    Handler,
}

/// What the default-action table resolves a signal to when its disposition
/// is [`Disposition::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultAction {
    Terminate,
    CoreDump,
    Stop,
    Continue,
    Ignore,
}

/// `siginfo`: who sent a pending signal and why (spec §8 scenario 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SigInfo {
    pub signo: u32,
    pub sender_pid: u64,
    pub sender_uid: u32,
}

/// Per-signal state a [`crate::process::PosixProcess`] tracks: disposition,
/// flags, and the `siginfo` captured when it was last raised.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalState {
    pub disposition: Disposition,
    pub flags: u32,
    pub info: SigInfo,
}

impl Default for Disposition {
    fn default() -> Self {
        Disposition::Default
    }
}

/// Marker combined with the signal number into a process's exit-status
/// value by [`DefaultAction::Terminate`]/[`DefaultAction::CoreDump`],
/// mirroring `__POSIX_KILLED_STATUS`.
pub const KILLED_STATUS_MARKER: u16 = 0x8000;

fn default_action(num: u32) -> DefaultAction {
    match num {
        SIGHUP | SIGINT | SIGKILL | SIGPIPE | SIGALRM | SIGTERM | SIGUSR1 | SIGUSR2 => {
            DefaultAction::Terminate
        }
        SIGQUIT | SIGILL | SIGTRAP | SIGABRT | SIGBUS | SIGFPE | SIGSEGV => DefaultAction::CoreDump,
        SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => DefaultAction::Stop,
        SIGCONT => DefaultAction::Continue,
        SIGCHLD | SIGURG | SIGWINCH => DefaultAction::Ignore,
        _ => DefaultAction::Ignore,
    }
}

/// The outcome a caller must act on after applying a signal's default
/// action — this module has no access to the target `Process`, so it
/// returns the decision rather than killing anything itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOutcome {
    /// Terminate (or core-dump, treated the same for now) the target with
    /// this encoded low-16-bits status.
    Kill(u16),
    /// Stop/continue: not implemented, logged and otherwise ignored.
    StopContinue,
    Ignore,
}

/// Resolve a signal's default action (spec §4.E's default-action table).
pub fn resolve_default(num: u32) -> DefaultOutcome {
    match default_action(num) {
        DefaultAction::Terminate | DefaultAction::CoreDump => {
            DefaultOutcome::Kill(KILLED_STATUS_MARKER | (num as u16 & 0x7fff))
        }
        DefaultAction::Stop | DefaultAction::Continue => DefaultOutcome::StopContinue,
        DefaultAction::Ignore => DefaultOutcome::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigterm_defaults_to_kill() {
        assert!(matches!(resolve_default(SIGTERM), DefaultOutcome::Kill(_)));
    }

    #[test]
    fn sigchld_defaults_to_ignore() {
        assert_eq!(resolve_default(SIGCHLD), DefaultOutcome::Ignore);
    }

    #[test]
    fn sigstop_defaults_to_stop_continue() {
        assert_eq!(resolve_default(SIGSTOP), DefaultOutcome::StopContinue);
    }
}
