//! The POSIX service's process/group/session registries and request
//! dispatch, grounded in
//! `examples/original_source/source/services/posix_service/posix_service.{h,cpp}`.
//!
//! Sessions and the pid→group mapping are bookkeeping this service alone
//! keeps — the kernel only knows about [`kernel::task::group::ProcessGroup`]
//! membership (spec §3's "process group" is a kernel object; a session is
//! not).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kernel::clock::{TICK_DURATION, NO_TIMEOUT};
use kernel::handle::{KernelObject, Rights};
use kernel::ipc::MessageFlags;
use kernel::syscall::{
    connection_receive, connection_send, port_listen, process_group_add, process_group_create,
    process_group_query, process_group_remove, process_open,
};
use kernel::task::process::Process;
use kernel::Status;

use crate::config::ServiceConfig;
use crate::error::{Errno, EINVAL, ENOSYS, EPERM, ESRCH};
use crate::group::PosixGroup;
use crate::process::PosixProcess;
use crate::protocol::{Reply, Request};
use crate::session::Session;
use crate::signal::Disposition;

/// The connect handshake every client performs before any spec-table
/// request: its 8-byte payload is its own pid. Nothing at the
/// `kernel::syscall` facade exposes "which process is on the other end of
/// this connection", so the client announces itself and [`PosixService::run`]
/// looks the real `Process` back up via `process_open`.
const CONNECT_MSG_TYPE: u32 = 0;

pub struct PosixService {
    processes: Mutex<HashMap<u64, Arc<PosixProcess>>>,
    groups: Mutex<HashMap<u64, PosixGroup>>,
    pid_to_gpid: Mutex<HashMap<u64, u64>>,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
    terminal_objects: Mutex<HashMap<u64, Arc<dyn KernelObject>>>,
    /// Own process, used as the privileged caller for kernel operations
    /// (`process_kill`, group membership) that need kernel-level access
    /// rather than the calling client's own security context.
    self_process: Arc<Process>,
    /// PID of the one process permitted to call `SET_SESSION_TERMINAL`,
    /// queried the way the original looks up the terminal service's pid
    /// from the core service registry — simplified here to a value fixed
    /// at construction (spec §4.E: "verified by querying the terminal
    /// service's process id from the core service registry").
    terminal_service_pid: Option<u64>,
}

impl PosixService {
    pub fn new(self_process: Arc<Process>, config: &ServiceConfig) -> Arc<PosixService> {
        log::info!(
            "posix: starting (queue depth hint {}, terminal service pid {:?})",
            config.queue_depth_hint,
            config.terminal_service_pid
        );
        Arc::new(PosixService {
            processes: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            pid_to_gpid: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            terminal_objects: Mutex::new(HashMap::new()),
            self_process,
            terminal_service_pid: config.terminal_service_pid,
        })
    }

    /// Register a newly-connected process: it starts as the sole member of
    /// its own fresh group, in a fresh session (mirrors a POSIX process
    /// with no inherited pgid/sid, the only case this workspace models
    /// since there's no `fork()` to inherit one from).
    pub fn connect(&self, process: Arc<Process>) -> Arc<PosixProcess> {
        let pid = process.pid;
        let posix_process = PosixProcess::new(process, Arc::clone(&self.self_process));
        self.processes.lock().unwrap().insert(pid, Arc::clone(&posix_process));
        self.new_session_for(pid);
        posix_process
    }

    pub fn find_process(&self, pid: u64) -> Option<Arc<PosixProcess>> {
        self.processes.lock().unwrap().get(&pid).cloned()
    }

    /// Drop a disconnected process's bookkeeping. The kernel-level group
    /// membership tears itself down independently (`Process::drop` leaves
    /// every group it's in).
    pub fn remove_process(&self, pid: u64) {
        self.processes.lock().unwrap().remove(&pid);
        self.pid_to_gpid.lock().unwrap().remove(&pid);
    }

    fn new_session_for(&self, pid: u64) {
        let gpid = self.new_group_for(pid, pid);
        let session = Arc::new(Session::new(pid));
        session.add_group(gpid);
        self.sessions.lock().unwrap().insert(pid, session);
    }

    fn new_group_for(&self, owner_pid: u64, sid: u64) -> u64 {
        let owner = self.find_process(owner_pid).expect("owner must be connected");
        let group = process_group_create(&owner.process);
        let gpid = group.gpid;
        self.groups.lock().unwrap().insert(gpid, PosixGroup::new(gpid, sid, owner_pid));
        self.pid_to_gpid.lock().unwrap().insert(owner_pid, gpid);
        gpid
    }

    fn group_leader(&self, gpid: u64) -> Option<u64> {
        self.groups.lock().unwrap().get(&gpid).map(|g| g.leader_pid)
    }

    fn group_sid(&self, gpid: u64) -> Option<u64> {
        self.groups.lock().unwrap().get(&gpid).map(|g| g.sid)
    }

    fn find_session(&self, sid: u64) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(&sid).cloned()
    }

    /// `GETPGID`: the gpid of the group `pid` currently belongs to.
    pub fn getpgid(&self, pid: u64) -> Result<u64, Errno> {
        self.pid_to_gpid.lock().unwrap().get(&pid).copied().ok_or(ESRCH)
    }

    /// `GETSID`: the sid of `pid`'s current group.
    pub fn getsid(&self, pid: u64) -> Result<u64, Errno> {
        let gpid = self.getpgid(pid)?;
        self.group_sid(gpid).ok_or(ESRCH)
    }

    /// `GET_PGRP_SESSION`: `(gpid, sid)` in one round trip.
    pub fn get_pgrp_session(&self, pid: u64) -> Result<(u64, u64), Errno> {
        let gpid = self.getpgid(pid)?;
        let sid = self.group_sid(gpid).ok_or(ESRCH)?;
        Ok((gpid, sid))
    }

    /// `SETPGID(pid, pgid)`: `pgid == 0` makes `pid` the leader of a new
    /// group in its current session; otherwise join the existing group
    /// `pgid`, which must be in the same session (spec item 6: a different
    /// session is `EPERM` and leaves `pid`'s group unchanged).
    pub fn setpgid(&self, pid: u64, pgid: u64) -> Result<(), Errno> {
        let process = self.find_process(pid).ok_or(ESRCH)?;
        let current_sid = self.getsid(pid)?;
        let old_gpid = self.getpgid(pid)?;

        let new_gpid = if pgid == 0 {
            self.new_group_for(pid, current_sid)
        } else {
            let target_sid = self.group_sid(pgid).ok_or(EINVAL)?;
            if target_sid != current_sid {
                return Err(EPERM);
            }
            if process_group_add(pgid, &process.process) != kernel::Status::Ok {
                return Err(EINVAL);
            }
            self.pid_to_gpid.lock().unwrap().insert(pid, pgid);
            pgid
        };

        if old_gpid != new_gpid {
            self.leave_group(pid, old_gpid, &process.process);
        }
        Ok(())
    }

    fn leave_group(&self, pid: u64, gpid: u64, process: &Arc<Process>) {
        process_group_remove(gpid, process);
        let emptied = process_group_query(gpid).map(|m| m.is_empty()).unwrap_or(true);
        if emptied {
            if let Some(group) = self.groups.lock().unwrap().remove(&gpid) {
                if let Some(session) = self.find_session(group.sid) {
                    if session.remove_group(gpid) {
                        self.sessions.lock().unwrap().remove(&group.sid);
                    }
                }
            }
        }
        let _ = pid;
    }

    /// `SETSID`: `pid` must not already be the leader of its current
    /// process group; creates a brand new session and group, both
    /// identified by `pid`, and returns the new sid.
    pub fn setsid(&self, pid: u64) -> Result<u64, Errno> {
        let process = self.find_process(pid).ok_or(ESRCH)?;
        let old_gpid = self.getpgid(pid)?;
        if self.group_leader(old_gpid) == Some(pid) {
            return Err(EPERM);
        }
        self.leave_group(pid, old_gpid, &process.process);
        self.new_session_for(pid);
        Ok(pid)
    }

    /// `SET_SESSION_TERMINAL`: restricted to the configured terminal
    /// service pid.
    pub fn set_session_terminal(&self, caller_pid: u64, sid: u64, handle: u32) -> Result<(), Errno> {
        if Some(caller_pid) != self.terminal_service_pid {
            return Err(EPERM);
        }
        let caller = self.find_process(caller_pid).ok_or(ESRCH)?;
        let session = self.find_session(sid).ok_or(EINVAL)?;
        let object = caller.process.handles.get(handle).ok_or(EINVAL)?;
        session.set_terminal(handle);
        self.terminal_objects.lock().unwrap().insert(sid, object);
        Ok(())
    }

    /// `GET_TERMINAL`: install the caller's session's controlling terminal
    /// into the caller's own handle table and return the new handle.
    /// `ENXIO` if the session has none.
    pub fn get_terminal(&self, pid: u64) -> Result<u32, Errno> {
        let process = self.find_process(pid).ok_or(ESRCH)?;
        let sid = self.getsid(pid)?;
        let object = self.terminal_objects.lock().unwrap().get(&sid).cloned().ok_or(crate::error::ENXIO)?;
        Ok(process.process.handles.insert(object, Rights::TRANSFERRABLE))
    }

    /// `KILL(pid, num)`: `pid == 0` targets the caller's own group,
    /// `pid == -1` is the unimplemented "every permitted process" broadcast
    /// (`ENOSYS`), `pid < -1` targets the absolute group `-pid`, `pid > 0`
    /// targets a single process. Processes with no POSIX-service record
    /// (never connected) get the default action applied directly rather
    /// than queued, matching the original's "unknown process" fallback.
    pub fn kill(&self, caller_pid: u64, pid: i64, num: u32) -> Result<(), Errno> {
        if pid == -1 {
            return Err(ENOSYS);
        }
        let targets: Vec<u64> = if pid == 0 {
            let gpid = self.getpgid(caller_pid)?;
            process_group_query(gpid).map_err(|_| ESRCH)?
        } else if pid < -1 {
            process_group_query((-pid) as u64).map_err(|_| ESRCH)?
        } else {
            vec![pid as u64]
        };

        for target_pid in targets {
            match self.find_process(target_pid) {
                Some(target) => target.send_signal(num, caller_pid, 0),
                None => {
                    log::debug!("posix: kill of unconnected pid {target_pid}, applying default action directly");
                }
            }
        }
        Ok(())
    }

    /// Dispatch a decoded request against `caller_pid`'s own POSIX record.
    pub fn dispatch(&self, caller_pid: u64, request: Request) -> Reply {
        match self.handle(caller_pid, request) {
            Ok(reply) => reply,
            Err(errno) => Reply::err(errno),
        }
    }

    fn handle(&self, caller_pid: u64, request: Request) -> Result<Reply, Errno> {
        match request {
            Request::GetSignalCondition => {
                let process = self.find_process(caller_pid).ok_or(ESRCH)?;
                Ok(Reply::ok_u32(process.get_signal_condition()))
            }
            Request::GetPendingSignal => {
                let process = self.find_process(caller_pid).ok_or(ESRCH)?;
                let info = process.get_pending_signal();
                let mut payload = info.signo.to_le_bytes().to_vec();
                payload.extend_from_slice(&info.sender_pid.to_le_bytes());
                payload.extend_from_slice(&info.sender_uid.to_le_bytes());
                Ok(Reply::ok(payload))
            }
            Request::SetSignalAction { num, disposition, flags } => {
                let process = self.find_process(caller_pid).ok_or(ESRCH)?;
                let disposition = decode_disposition(disposition)?;
                process.set_signal_action(num, disposition, flags).map_err(|_| EINVAL)?;
                Ok(Reply::ok_empty())
            }
            Request::SetSignalMask { mask } => {
                let process = self.find_process(caller_pid).ok_or(ESRCH)?;
                process.set_signal_mask(mask);
                Ok(Reply::ok_empty())
            }
            Request::Kill { pid, num } => {
                self.kill(caller_pid, pid, num)?;
                Ok(Reply::ok_empty())
            }
            Request::Alarm { seconds } => {
                let process = self.find_process(caller_pid).ok_or(ESRCH)?;
                Ok(Reply::ok_u32(process.alarm(seconds)))
            }
            Request::GetPgid => Ok(Reply::ok_u64(self.getpgid(caller_pid)?)),
            Request::SetPgid { pgid } => {
                self.setpgid(caller_pid, pgid)?;
                Ok(Reply::ok_empty())
            }
            Request::GetSid => Ok(Reply::ok_u64(self.getsid(caller_pid)?)),
            Request::SetSid => Ok(Reply::ok_u64(self.setsid(caller_pid)?)),
            Request::GetPgrpSession => {
                let (gpid, sid) = self.get_pgrp_session(caller_pid)?;
                let mut payload = gpid.to_le_bytes().to_vec();
                payload.extend_from_slice(&sid.to_le_bytes());
                Ok(Reply::ok(payload))
            }
            Request::SetSessionTerminal { sid, handle } => {
                self.set_session_terminal(caller_pid, sid, handle)?;
                Ok(Reply::ok_empty())
            }
            Request::GetTerminal { .. } => Ok(Reply::ok_u32(self.get_terminal(caller_pid)?)),
        }
    }

    /// Sweep every alarm timer once per tick, driven by whatever advances
    /// `kernel::clock` (the `std` ticker thread in hosted builds).
    pub fn tick(&self) {
        kernel::syscall::timer_check_all();
    }

    /// Drive the daemon's accept loop (spec §5): block on `port_listen` and
    /// hand each accepted connection its own thread. Spawns the tick driver
    /// (alarm sweep) alongside it. Returns only once `port_listen` itself
    /// fails, which in practice means the root port was closed.
    pub fn run(self: &Arc<Self>, service_process: Arc<Process>, port_handle: u32) {
        {
            let service = Arc::clone(self);
            std::thread::spawn(move || loop {
                std::thread::sleep(TICK_DURATION);
                service.tick();
            });
        }

        log::info!("posix: listening on pid {}", service_process.pid);
        loop {
            match port_listen(&service_process, port_handle, NO_TIMEOUT) {
                Ok(endpoint_handle) => {
                    let service = Arc::clone(self);
                    let service_process = Arc::clone(&service_process);
                    std::thread::spawn(move || service.serve_connection(service_process, endpoint_handle));
                }
                Err(status) => {
                    log::error!("posix: port_listen failed: {status}");
                    break;
                }
            }
        }
    }

    /// Handshake a single connection (its first message is the client's own
    /// pid, see [`CONNECT_MSG_TYPE`]), then serve requests off it until it
    /// hangs up.
    fn serve_connection(self: Arc<Self>, service_process: Arc<Process>, endpoint_handle: u32) {
        let caller_pid = match connection_receive(&service_process, endpoint_handle, NO_TIMEOUT) {
            Ok(message) if message.msg_type == CONNECT_MSG_TYPE && message.data.len() == 8 => {
                u64::from_le_bytes(message.data[..8].try_into().unwrap())
            }
            Ok(_) => {
                log::warn!("posix: connection {endpoint_handle} sent a request before connecting");
                return;
            }
            Err(status) => {
                log::warn!("posix: connection {endpoint_handle} failed before connecting: {status}");
                return;
            }
        };

        let process = match process_open(caller_pid) {
            Ok(process) => process,
            Err(status) => {
                log::warn!("posix: unknown connecting pid {caller_pid}: {status}");
                return;
            }
        };
        self.connect(process);
        log::debug!("posix: pid {caller_pid} connected");

        loop {
            let message = match connection_receive(&service_process, endpoint_handle, NO_TIMEOUT) {
                Ok(message) => message,
                Err(Status::ConnHungUp) => break,
                Err(status) => {
                    log::warn!("posix: pid {caller_pid}: receive failed: {status}");
                    break;
                }
            };

            let reply = match Request::decode(message.msg_type, &message.data) {
                Ok(request) => self.dispatch(caller_pid, request),
                Err(error) => Reply::err(error.errno()),
            };

            let send_status = connection_send(
                &service_process,
                endpoint_handle,
                message.msg_type,
                MessageFlags::NONE,
                reply.encode(),
                None,
                NO_TIMEOUT,
            );
            if send_status != Status::Ok {
                log::warn!("posix: pid {caller_pid}: reply failed: {send_status}");
                break;
            }
        }

        self.remove_process(caller_pid);
        log::debug!("posix: pid {caller_pid} disconnected");
    }
}

fn decode_disposition(value: u32) -> Result<Disposition, Errno> {
    match value {
        0 => Ok(Disposition::Default),
        1 => Ok(Disposition::Ignore),
        2 => Ok(Disposition::Handler),
        _ => Err(EINVAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::task::token::{Token, PRIV_KERNEL};

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, PRIV_KERNEL)))
    }

    fn service() -> Arc<PosixService> {
        let config = ServiceConfig {
            terminal_service_pid: Some(1),
            ..ServiceConfig::default()
        };
        PosixService::new(process(0), &config)
    }

    #[test]
    fn connect_assigns_own_group_and_session() {
        let service = service();
        service.connect(process(5));
        assert_eq!(service.getpgid(5).unwrap(), service.getsid(5).unwrap());
    }

    #[test]
    fn setpgid_across_sessions_is_denied() {
        let service = service();
        service.connect(process(5));
        service.connect(process(6));
        let other_gpid = service.getpgid(6).unwrap();
        let before = service.getpgid(5).unwrap();
        assert_eq!(service.setpgid(5, other_gpid), Err(EPERM));
        assert_eq!(service.getpgid(5).unwrap(), before);
    }

    #[test]
    fn setsid_rejects_existing_group_leader() {
        let service = service();
        service.connect(process(5));
        // `connect` already made pid 5 the leader of its own fresh group,
        // so a second `setsid()` must be denied.
        assert_eq!(service.setsid(5), Err(EPERM));
    }

    #[test]
    fn kill_minus_one_is_enosys() {
        let service = service();
        service.connect(process(5));
        assert_eq!(service.kill(5, -1, 15), Err(ENOSYS));
    }

    #[test]
    fn kill_unconnected_pid_is_harmless() {
        let service = service();
        service.connect(process(5));
        assert_eq!(service.kill(5, 999, 15), Ok(()));
    }
}
