//! Device node resource records (spec §3/§4.B).
//!
//! A resource is an opaque record owned by a node, released in LIFO
//! registration order when the node is destroyed. Release callbacks must not
//! fail, matching the design this was grounded on
//! (`examples/original_source` device resource list).

use alloc::boxed::Box;

/// An opaque resource owned by a device node. Constructed via
/// [`Resource::new`] with a release callback that runs exactly once, in LIFO
/// order relative to other resources on the same node.
pub struct Resource {
    name: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Resource {
    pub fn new(name: &'static str, release: Box<dyn FnOnce() + Send>) -> Self {
        Resource {
            name,
            release: Some(release),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the release callback. Idempotent: a second call is a no-op.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn release_runs_once() {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let mut resource = Resource::new("test", Box::new(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        resource.release();
        resource.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
