//! Wire format for the POSIX service's message protocol (spec §4.E's
//! request table), carried as the `data` buffer of a
//! `kernel::ipc::KernelMessage` (grounded in `kernel::ipc::message`, which
//! has no serde dependency — messages are plain `Vec<u8>` with an attached
//! handle, exactly like the original's flat `ipc_kmessage_t`). Encoding is
//! little-endian fixed-width fields, decoded by hand rather than derived,
//! matching the teacher's own hand-rolled `KernelMessage`/handle-table
//! plumbing.

use crate::error::{Errno, ServiceError};

/// Request kinds, one per row of spec §4.E's message protocol table. The
/// numeric values are this service's own wire constants (the original used
/// an internal enum too; nothing about them is observable outside this
/// crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RequestKind {
    GetSignalCondition = 1,
    GetPendingSignal = 2,
    SetSignalAction = 3,
    SetSignalMask = 4,
    Kill = 5,
    Alarm = 6,
    GetPgid = 7,
    SetPgid = 8,
    GetSid = 9,
    SetSid = 10,
    GetPgrpSession = 11,
    SetSessionTerminal = 12,
    GetTerminal = 13,
}

impl RequestKind {
    fn from_u32(value: u32) -> Option<RequestKind> {
        Some(match value {
            1 => RequestKind::GetSignalCondition,
            2 => RequestKind::GetPendingSignal,
            3 => RequestKind::SetSignalAction,
            4 => RequestKind::SetSignalMask,
            5 => RequestKind::Kill,
            6 => RequestKind::Alarm,
            7 => RequestKind::GetPgid,
            8 => RequestKind::SetPgid,
            9 => RequestKind::GetSid,
            10 => RequestKind::SetSid,
            11 => RequestKind::GetPgrpSession,
            12 => RequestKind::SetSessionTerminal,
            13 => RequestKind::GetTerminal,
            _ => return None,
        })
    }
}

/// A decoded request, with the `msg_type`/payload fields pulled apart into
/// named arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetSignalCondition,
    GetPendingSignal,
    SetSignalAction { num: u32, disposition: u32, flags: u32 },
    SetSignalMask { mask: u32 },
    Kill { pid: i64, num: u32 },
    Alarm { seconds: u32 },
    GetPgid,
    SetPgid { pgid: u64 },
    GetSid,
    SetSid,
    GetPgrpSession,
    SetSessionTerminal { sid: u64, handle: u32 },
    GetTerminal { access: u32, flags: u32 },
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, ServiceError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .ok_or(ServiceError::MalformedRequest("request too short"))?
        .try_into()
        .unwrap();
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ServiceError> {
    let bytes: [u8; 8] = data
        .get(offset..offset + 8)
        .ok_or(ServiceError::MalformedRequest("request too short"))?
        .try_into()
        .unwrap();
    Ok(u64::from_le_bytes(bytes))
}

fn read_i64(data: &[u8], offset: usize) -> Result<i64, ServiceError> {
    read_u64(data, offset).map(|v| v as i64)
}

impl Request {
    /// Decode a request from its `msg_type` (the `RequestKind`) and raw
    /// `data` payload.
    pub fn decode(msg_type: u32, data: &[u8]) -> Result<Request, ServiceError> {
        let kind = RequestKind::from_u32(msg_type).ok_or(ServiceError::UnknownRequest(msg_type))?;
        Ok(match kind {
            RequestKind::GetSignalCondition => Request::GetSignalCondition,
            RequestKind::GetPendingSignal => Request::GetPendingSignal,
            RequestKind::SetSignalAction => Request::SetSignalAction {
                num: read_u32(data, 0)?,
                disposition: read_u32(data, 4)?,
                flags: read_u32(data, 8)?,
            },
            RequestKind::SetSignalMask => Request::SetSignalMask { mask: read_u32(data, 0)? },
            RequestKind::Kill => Request::Kill { pid: read_i64(data, 0)?, num: read_u32(data, 8)? },
            RequestKind::Alarm => Request::Alarm { seconds: read_u32(data, 0)? },
            RequestKind::GetPgid => Request::GetPgid,
            RequestKind::SetPgid => Request::SetPgid { pgid: read_u64(data, 0)? },
            RequestKind::GetSid => Request::GetSid,
            RequestKind::SetSid => Request::SetSid,
            RequestKind::GetPgrpSession => Request::GetPgrpSession,
            RequestKind::SetSessionTerminal => Request::SetSessionTerminal {
                sid: read_u64(data, 0)?,
                handle: read_u32(data, 8)?,
            },
            RequestKind::GetTerminal => Request::GetTerminal { access: read_u32(data, 0)?, flags: read_u32(data, 4)? },
        })
    }
}

/// A reply: an `errno` (0 on success) plus a kind-specific payload, encoded
/// the same flat little-endian way.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub err: Errno,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(payload: Vec<u8>) -> Reply {
        Reply { err: 0, payload }
    }

    pub fn err(errno: Errno) -> Reply {
        Reply { err: errno, payload: Vec::new() }
    }

    pub fn ok_u32(value: u32) -> Reply {
        Reply::ok(value.to_le_bytes().to_vec())
    }

    pub fn ok_u64(value: u64) -> Reply {
        Reply::ok(value.to_le_bytes().to_vec())
    }

    pub fn ok_empty() -> Reply {
        Reply::ok(Vec::new())
    }

    /// Flatten to the bytes a `KernelMessage`'s `data` field carries: a
    /// 4-byte `errno` followed by the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.payload.len());
        bytes.extend_from_slice(&(self.err as i32).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_set_signal_mask() {
        let data = 7u32.to_le_bytes().to_vec();
        let request = Request::decode(RequestKind::SetSignalMask as u32, &data).unwrap();
        assert_eq!(request, Request::SetSignalMask { mask: 7 });
    }

    #[test]
    fn decodes_kill_with_negative_pid() {
        let mut data = (-1i64).to_le_bytes().to_vec();
        data.extend_from_slice(&15u32.to_le_bytes());
        let request = Request::decode(RequestKind::Kill as u32, &data).unwrap();
        assert_eq!(request, Request::Kill { pid: -1, num: 15 });
    }

    #[test]
    fn unknown_msg_type_rejected() {
        assert!(matches!(Request::decode(999, &[]), Err(ServiceError::UnknownRequest(999))));
    }

    #[test]
    fn truncated_payload_rejected() {
        assert!(Request::decode(RequestKind::SetSignalMask as u32, &[0u8; 2]).is_err());
    }

    #[test]
    fn reply_encodes_errno_then_payload() {
        let reply = Reply::ok_u32(42);
        let encoded = reply.encode();
        assert_eq!(&encoded[0..4], &0i32.to_le_bytes());
        assert_eq!(&encoded[4..8], &42u32.to_le_bytes());
    }
}
