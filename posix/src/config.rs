//! `posixd`'s startup configuration: a handful of knobs read from CLI flags
//! and environment variables, parsed by hand the way the teacher's own
//! daemon configs are (no CLI-parsing crate pulled in for three flags).

/// Runtime configuration for the POSIX service daemon.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Reported at startup for operational visibility; the wire-level queue
    /// depth itself is `kernel::ipc::IPC_QUEUE_MAX`, a kernel-level constant
    /// this daemon doesn't override.
    pub queue_depth_hint: usize,
    /// The one pid permitted to call `SET_SESSION_TERMINAL`. `None` means
    /// no process may set a controlling terminal (every session stays
    /// terminal-less), matching the default when no terminal service has
    /// been configured yet.
    pub terminal_service_pid: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            queue_depth_hint: kernel::ipc::IPC_QUEUE_MAX,
            terminal_service_pid: None,
        }
    }
}

impl ServiceConfig {
    /// Layer CLI args over `POSIXD_*` environment variables over the
    /// built-in default, in that priority order. Unrecognized flags and
    /// unparsable values are ignored rather than rejected — this is a
    /// best-effort daemon config, not a user-facing CLI surface.
    pub fn from_env_and_args<I: IntoIterator<Item = String>>(args: I) -> ServiceConfig {
        let mut config = ServiceConfig::default();

        if let Ok(pid) = std::env::var("POSIXD_TERMINAL_SERVICE_PID") {
            if let Ok(pid) = pid.parse() {
                config.terminal_service_pid = Some(pid);
            }
        }
        if let Ok(depth) = std::env::var("POSIXD_QUEUE_DEPTH_HINT") {
            if let Ok(depth) = depth.parse() {
                config.queue_depth_hint = depth;
            }
        }

        for arg in args {
            if let Some(value) = arg.strip_prefix("--terminal-service-pid=") {
                if let Ok(pid) = value.parse() {
                    config.terminal_service_pid = Some(pid);
                }
            } else if let Some(value) = arg.strip_prefix("--queue-depth-hint=") {
                if let Ok(depth) = value.parse() {
                    config.queue_depth_hint = depth;
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_overrides_default() {
        let config = ServiceConfig::from_env_and_args(vec!["--terminal-service-pid=7".to_string()]);
        assert_eq!(config.terminal_service_pid, Some(7));
    }

    #[test]
    fn unparsable_flag_is_ignored() {
        let config = ServiceConfig::from_env_and_args(vec!["--queue-depth-hint=not-a-number".to_string()]);
        assert_eq!(config.queue_depth_hint, kernel::ipc::IPC_QUEUE_MAX);
    }

    #[test]
    fn unknown_flag_is_ignored() {
        let config = ServiceConfig::from_env_and_args(vec!["--bogus=1".to_string()]);
        assert_eq!(config.terminal_service_pid, None);
    }
}
