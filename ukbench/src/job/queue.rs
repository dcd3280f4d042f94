//! Per-permutation FIFO of run stages.

use super::spec::RunSpec;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

/// Error raised when enqueueing into a full [`RunQueue`].
#[derive(Debug, Error)]
#[error("run queue is at full capacity ({0})")]
pub struct QueueFull(pub usize);

/// Bounded FIFO of run stages.
///
/// The scheduler loop is the only consumer; the queue still carries its own
/// lock because [`clear`](RunQueue::clear) is the cancellation primitive and
/// may be invoked from a supervisor task.
#[derive(Debug)]
pub struct RunQueue {
    inner: Mutex<VecDeque<RunSpec>>,
    capacity: usize,
}

impl RunQueue {
    /// Creates an empty queue holding at most `capacity` stages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a stage, failing when the queue is at capacity.
    pub fn enqueue(&self, run: RunSpec) -> Result<(), QueueFull> {
        let mut inner = self.inner.lock().unwrap();
        if inner.len() >= self.capacity {
            return Err(QueueFull(self.capacity));
        }
        inner.push_back(run);
        Ok(())
    }

    /// Removes and returns the stage at the head of the queue.
    pub fn dequeue(&self) -> Option<RunSpec> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Returns a copy of the head stage without removing it.
    pub fn peek(&self) -> Option<RunSpec> {
        self.inner.lock().unwrap().front().cloned()
    }

    /// Number of stages still queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every remaining stage atomically.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Total capacity the queue was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str) -> RunSpec {
        RunSpec {
            name: name.into(),
            cores: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = RunQueue::new(3);
        queue.enqueue(stage("a")).unwrap();
        queue.enqueue(stage("b")).unwrap();
        queue.enqueue(stage("c")).unwrap();

        assert_eq!(queue.dequeue().unwrap().name, "a");
        assert_eq!(queue.dequeue().unwrap().name, "b");
        assert_eq!(queue.dequeue().unwrap().name, "c");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let queue = RunQueue::new(2);
        queue.enqueue(stage("a")).unwrap();

        assert_eq!(queue.peek().unwrap().name, "a");
        assert_eq!(queue.peek().unwrap().name, "a");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_beyond_capacity_fails() {
        let queue = RunQueue::new(1);
        queue.enqueue(stage("a")).unwrap();

        assert!(queue.enqueue(stage("b")).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let queue = RunQueue::new(4);
        queue.enqueue(stage("a")).unwrap();
        queue.enqueue(stage("b")).unwrap();

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());

        // clearing an empty queue is fine
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
