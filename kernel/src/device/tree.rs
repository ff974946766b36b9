//! The device tree's public contract (spec §4.B): `create`, `alias`,
//! `publish`, `destroy`, `open`, `attr`, `iterate`, `path`,
//! `resource_register`.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::Ordering;

use crate::device::attribute::{Attribute, AttributeType};
use crate::device::node::{Node, NodeOps};
use crate::device::resource::Resource;
use crate::status::Status;

/// The device tree: a single rooted namespace of [`Node`]s.
pub struct Tree {
    root: Arc<Node>,
}

impl Tree {
    pub fn new() -> Self {
        let root = Arc::new(Node::new_root());
        root.published.store(true, Ordering::Release);
        Tree { root }
    }

    pub fn root(&self) -> Arc<Node> {
        Arc::clone(&self.root)
    }

    /// Create a child node under `parent`. Fails with `AlreadyExists` if
    /// `parent` already has a child with this name.
    pub fn create(
        &self,
        name: &str,
        parent: &Arc<Node>,
        ops: Option<Arc<dyn NodeOps>>,
        private: Option<Box<dyn Any + Send + Sync>>,
        attrs: Vec<(String, Attribute)>,
    ) -> Result<Arc<Node>, Status> {
        let mut children = parent.children.write();
        if children.contains_key(name) {
            return Err(Status::AlreadyExists);
        }
        let node = Arc::new(Node::new_child(name, parent, ops, private));
        for (key, value) in attrs {
            node.set_attr(&key, value);
        }
        children.insert(String::from(name), Arc::clone(&node));
        Ok(node)
    }

    /// Create an alias at `name` under `parent` pointing at `dest`. If `dest`
    /// is itself an alias, the new alias collapses to point directly at
    /// `dest`'s concrete target (spec's "alias collapse").
    pub fn alias(
        &self,
        name: &str,
        parent: &Arc<Node>,
        dest: &Arc<Node>,
    ) -> Result<Arc<Node>, Status> {
        let target = if dest.is_alias() {
            dest.alias_target.clone().expect("is_alias implies alias_target")
        } else {
            Arc::clone(dest)
        };

        let mut children = parent.children.write();
        if children.contains_key(name) {
            return Err(Status::AlreadyExists);
        }
        let alias_node = Arc::new(Node::new_alias(name, parent, Arc::clone(&target)));
        alias_node.published.store(true, Ordering::Release);
        children.insert(String::from(name), Arc::clone(&alias_node));
        drop(children);

        target.aliases.lock().push(Arc::downgrade(&alias_node));
        Ok(alias_node)
    }

    pub fn publish(&self, node: &Arc<Node>) {
        node.published.store(true, Ordering::Release);
    }

    /// Destroy `node`. Fails with `InUse` if its reference count is
    /// non-zero. Destroying a non-alias destroys every alias pointing at it
    /// first; resources release in LIFO order.
    pub fn destroy(&self, node: &Arc<Node>) -> Status {
        if node.ref_count() != 0 {
            return Status::InUse;
        }

        if !node.is_alias() {
            let aliases: Vec<Weak<Node>> = core::mem::take(&mut *node.aliases.lock());
            for weak in aliases {
                if let Some(alias_node) = weak.upgrade() {
                    self.destroy(&alias_node);
                }
            }
        }

        {
            let mut resources = node.resources.lock();
            while let Some(mut resource) = resources.pop() {
                resource.release();
            }
        }

        if let Some(target) = &node.alias_target {
            let self_weak_matches = |w: &Weak<Node>| {
                w.upgrade().map(|n| Arc::ptr_eq(&n, node)).unwrap_or(false)
            };
            target.aliases.lock().retain(|w| !self_weak_matches(w));
        }

        if let Some(parent) = node.parent() {
            parent.children.write().remove(&node.name);
        }

        Status::Ok
    }

    fn effectively_published(node: &Arc<Node>) -> bool {
        if !node.is_published() {
            return false;
        }
        let mut current = node.parent();
        while let Some(ancestor) = current {
            if !ancestor.is_published() {
                return false;
            }
            current = ancestor.parent();
        }
        true
    }

    /// Resolve `path` (slash-separated, leading slash optional) to a node,
    /// collapsing a trailing alias to its target. Increments the resolved
    /// node's reference count on success; the caller must [`Tree::close`] it
    /// when done.
    pub fn open(&self, path: &str) -> Result<Arc<Node>, Status> {
        let mut current = Arc::clone(&self.root);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !Self::effectively_published(&current) {
                return Err(Status::NotFound);
            }
            let next = current.children.read().get(segment).cloned();
            current = next.ok_or(Status::NotFound)?;
        }

        if !Self::effectively_published(&current) {
            return Err(Status::NotFound);
        }

        let resolved = if current.is_alias() {
            let target = current
                .alias_target
                .clone()
                .expect("is_alias implies alias_target");
            if !Self::effectively_published(&target) {
                return Err(Status::NotFound);
            }
            target
        } else {
            current
        };

        resolved.ref_count.fetch_add(1, Ordering::AcqRel);
        Ok(resolved)
    }

    /// Release a reference obtained from [`Tree::open`].
    pub fn close(&self, node: &Arc<Node>) {
        node.ref_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Read attribute `name`, asserting it has kind `expected`.
    pub fn attr(
        &self,
        node: &Arc<Node>,
        name: &str,
        expected: AttributeType,
        buf: &mut [u8],
    ) -> Result<usize, Status> {
        let attr = node.get_attr(name).ok_or(Status::NotFound)?;
        if attr.type_tag() != expected {
            return Err(Status::IncorrectType);
        }
        match &attr {
            Attribute::Str(_) => attr.encode_into(buf).ok_or(Status::TooSmall),
            _ => {
                if buf.len() != attr.encoded_len() {
                    return Err(Status::InvalidArg);
                }
                attr.encode_into(buf).ok_or(Status::InvalidArg)
            }
        }
    }

    pub fn set_attr(&self, node: &Arc<Node>, name: &str, value: Attribute) {
        node.set_attr(name, value);
    }

    /// Depth-first walk starting at `start`. `callback` returning `false`
    /// stops the walk immediately, including descent into that node's
    /// children.
    pub fn iterate(&self, start: &Arc<Node>, callback: &mut dyn FnMut(&Arc<Node>) -> bool) {
        Self::iterate_inner(start, callback);
    }

    fn iterate_inner(node: &Arc<Node>, callback: &mut dyn FnMut(&Arc<Node>) -> bool) -> bool {
        if !callback(node) {
            return false;
        }
        let children: Vec<Arc<Node>> = node.children.read().values().cloned().collect();
        for child in children {
            if !Self::iterate_inner(&child, callback) {
                return false;
            }
        }
        true
    }

    /// Reconstruct the slash-separated path of `node` from the root.
    pub fn path(&self, node: &Arc<Node>) -> String {
        let mut segments = Vec::new();
        let mut current = Some(Arc::clone(node));
        while let Some(n) = current {
            if Arc::ptr_eq(&n, &self.root) {
                break;
            }
            segments.push(n.name.clone());
            current = n.parent();
        }
        segments.reverse();

        let mut out = String::new();
        for segment in segments {
            out.push('/');
            out.push_str(&segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    pub fn resource_register(&self, node: &Arc<Node>, resource: Resource) {
        node.resources.lock().push(resource);
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
