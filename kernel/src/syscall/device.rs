//! `device_open`/`device_attr` (spec §6): wrap a device tree lookup behind
//! a handle so a node's open-reference lifetime participates in the same
//! close/wait model as every other kernel object.

use alloc::sync::Arc;
use core::any::Any;

use crate::device::{AttributeType, Node, Tree};
use crate::handle::{KernelObject, ObjectType, Rights};
use crate::status::Status;
use crate::task::process::Process;

/// A handle-table entry for an open device node. Closing it releases the
/// reference [`Tree::open`] took.
pub struct DeviceHandle {
    tree: Arc<Tree>,
    node: Arc<Node>,
}

impl DeviceHandle {
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }
}

impl KernelObject for DeviceHandle {
    fn object_type(&self) -> ObjectType {
        ObjectType::Device
    }

    fn close(&self) {
        self.tree.close(&self.node);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `device_open`: resolve `path` against the system device tree and install
/// a handle to it in `process`'s table.
pub fn device_open(tree: &Arc<Tree>, process: &Arc<Process>, path: &str) -> Result<u32, Status> {
    let node = tree.open(path)?;
    let handle_obj = Arc::new(DeviceHandle {
        tree: Arc::clone(tree),
        node,
    });
    Ok(process.handles.insert(handle_obj, Rights::NONE))
}

/// `device_attr`: read attribute `name` off the node behind `handle`.
pub fn device_attr(
    process: &Arc<Process>,
    handle: u32,
    name: &str,
    expected: AttributeType,
    buf: &mut [u8],
) -> Result<usize, Status> {
    let object = process.handles.get_typed(handle, ObjectType::Device)?;
    let device = object
        .as_any()
        .downcast_ref::<DeviceHandle>()
        .ok_or(Status::InvalidArg)?;
    device.tree.attr(&device.node, name, expected, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Attribute;
    use crate::task::token::Token;
    use alloc::string::String;

    fn process(pid: u64) -> Arc<Process> {
        Process::new(pid, "p".into(), Arc::new(Token::new(0, 0, 0)))
    }

    #[test]
    fn open_reads_attr_and_close_releases_reference() {
        let tree = Arc::new(Tree::new());
        let root = tree.root();
        let node = tree
            .create(
                "disk0",
                &root,
                None,
                None,
                alloc::vec![(String::from("irq"), Attribute::U32(9))],
            )
            .unwrap();
        tree.publish(&node);

        let p = process(1);
        let handle = device_open(&tree, &p, "/disk0").unwrap();
        let mut buf = [0u8; 4];
        let n = device_attr(&p, handle, "irq", AttributeType::U32, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(u32::from_ne_bytes(buf), 9);

        assert_eq!(tree.destroy(&node), Status::InUse);
        assert_eq!(p.handles.close(handle), Status::Ok);
        assert_eq!(tree.destroy(&node), Status::Ok);
    }

    #[test]
    fn open_missing_path_not_found() {
        let tree = Arc::new(Tree::new());
        let p = process(1);
        assert_eq!(device_open(&tree, &p, "/nope").unwrap_err(), Status::NotFound);
    }
}
