//! The reaper (spec §9 design note): dead threads are handed off to a
//! single consumer instead of being torn down inline on whatever thread
//! happened to observe the exit, so thread teardown never runs on a thread
//! that might itself be mid-exit.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::sync::spinlock::Spinlock;
use crate::task::thread::Thread;

#[derive(Default)]
struct Queue {
    pending: Vec<Arc<Thread>>,
}

/// A FIFO of dead threads awaiting final teardown, drained by a single
/// reaper worker.
pub struct Reaper {
    queue: Spinlock<Queue>,
}

impl Reaper {
    pub const fn new() -> Self {
        Reaper {
            queue: Spinlock::new(Queue { pending: Vec::new() }),
        }
    }

    /// Hand a dead thread off to the reaper. Safe to call from any thread,
    /// including the dying thread itself.
    pub fn submit(&self, thread: Arc<Thread>) {
        self.queue.lock().pending.push(thread);
    }

    /// Drain every thread currently queued, running `teardown` on each.
    /// Intended to be called from exactly one worker; concurrent callers
    /// each drain a disjoint subset of whatever was queued at the time.
    pub fn drain(&self, mut teardown: impl FnMut(Arc<Thread>)) -> usize {
        let batch = core::mem::take(&mut self.queue.lock().pending);
        let count = batch.len();
        for thread in batch {
            teardown(thread);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().pending.len()
    }
}

impl Default for Reaper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn drain_runs_teardown_for_every_submission() {
        let reaper = Reaper::new();
        for i in 0..5 {
            reaper.submit(Thread::new(i, i.to_string(), Default::default()));
        }
        assert_eq!(reaper.pending_count(), 5);
        let mut seen = Vec::new();
        let drained = reaper.drain(|t| seen.push(t.tid));
        assert_eq!(drained, 5);
        assert_eq!(seen, alloc::vec![0, 1, 2, 3, 4]);
        assert_eq!(reaper.pending_count(), 0);
    }
}
