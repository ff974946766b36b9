//! Device tree nodes (spec §3/§4.B).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::device::attribute::Attribute;
use crate::device::resource::Resource;
use crate::sync::mutex::Mutex;
use crate::sync::rwlock::RwLock;

/// Per-node operations table, supplied by the module that creates a node.
/// Left as a marker trait: the concrete operations a device responds to
/// (read/write/ioctl) belong to the out-of-scope driver layer (spec §1).
pub trait NodeOps: Send + Sync {}

/// A node in the device tree: a named entry with a parent, a child map, and
/// the alias/attribute/resource bookkeeping of spec §3.
pub struct Node {
    pub(crate) name: String,
    parent: RwLock<Option<Weak<Node>>>,
    pub(crate) children: RwLock<BTreeMap<String, Arc<Node>>>,
    pub(crate) alias_target: Option<Arc<Node>>,
    pub(crate) aliases: Mutex<Vec<Weak<Node>>>,
    attrs: RwLock<BTreeMap<String, Attribute>>,
    irq_domain: RwLock<Option<u64>>,
    pub(crate) ref_count: AtomicUsize,
    pub(crate) published: AtomicBool,
    pub(crate) resources: Mutex<Vec<Resource>>,
    ops: Option<Arc<dyn NodeOps>>,
    private: Option<Box<dyn Any + Send + Sync>>,
}

impl Node {
    pub(crate) fn new_root() -> Self {
        Node {
            name: String::new(),
            parent: RwLock::new(None),
            children: RwLock::new(BTreeMap::new()),
            alias_target: None,
            aliases: Mutex::new(Vec::new()),
            attrs: RwLock::new(BTreeMap::new()),
            irq_domain: RwLock::new(None),
            ref_count: AtomicUsize::new(0),
            published: AtomicBool::new(false),
            resources: Mutex::new(Vec::new()),
            ops: None,
            private: None,
        }
    }

    pub(crate) fn new_child(
        name: &str,
        parent: &Arc<Node>,
        ops: Option<Arc<dyn NodeOps>>,
        private: Option<Box<dyn Any + Send + Sync>>,
    ) -> Self {
        let irq_domain = *parent.irq_domain.read();
        Node {
            name: String::from(name),
            parent: RwLock::new(Some(Arc::downgrade(parent))),
            children: RwLock::new(BTreeMap::new()),
            alias_target: None,
            aliases: Mutex::new(Vec::new()),
            attrs: RwLock::new(BTreeMap::new()),
            irq_domain: RwLock::new(irq_domain),
            ref_count: AtomicUsize::new(0),
            published: AtomicBool::new(false),
            resources: Mutex::new(Vec::new()),
            ops,
            private,
        }
    }

    pub(crate) fn new_alias(name: &str, parent: &Arc<Node>, target: Arc<Node>) -> Self {
        Node {
            name: String::from(name),
            parent: RwLock::new(Some(Arc::downgrade(parent))),
            children: RwLock::new(BTreeMap::new()),
            alias_target: Some(target),
            aliases: Mutex::new(Vec::new()),
            attrs: RwLock::new(BTreeMap::new()),
            irq_domain: RwLock::new(None),
            ref_count: AtomicUsize::new(0),
            published: AtomicBool::new(false),
            resources: Mutex::new(Vec::new()),
            ops: None,
            private: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alias(&self) -> bool {
        self.alias_target.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.read().clone().and_then(|w| w.upgrade())
    }

    pub fn set_attr(&self, name: &str, value: Attribute) {
        self.attrs.write().insert(String::from(name), value);
    }

    pub(crate) fn get_attr(&self, name: &str) -> Option<Attribute> {
        self.attrs.read().get(name).cloned()
    }

    pub fn irq_domain(&self) -> Option<u64> {
        *self.irq_domain.read()
    }

    pub fn set_irq_domain(&self, domain: u64) {
        *self.irq_domain.write() = Some(domain);
    }

    pub fn downcast_private<T: 'static>(&self) -> Option<&T> {
        self.private.as_ref()?.downcast_ref::<T>()
    }
}
