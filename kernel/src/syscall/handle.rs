//! `handle_close`/`handle_duplicate` (spec §6): the two handle-table
//! operations that don't need to know what kind of object sits behind the
//! handle, so they need nothing beyond [`HandleTable`] itself.

use alloc::sync::Arc;

use crate::status::Status;
use crate::task::process::Process;

pub fn handle_close(process: &Arc<Process>, handle: u32) -> Status {
    process.handles.close(handle)
}

pub fn handle_duplicate(process: &Arc<Process>, handle: u32) -> Result<u32, Status> {
    process.handles.duplicate(handle)
}
