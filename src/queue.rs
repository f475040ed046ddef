//! Mounted queue: the per-pass callback buffer.
//!
//! One queue exists per independent render entry point. It accumulates
//! callbacks during that entry's synchronous mount/patch walk and flushes
//! exactly once, right after the walk returns. Two buckets:
//!
//! - **priority** — pushed explicitly by a component during its own render;
//!   runs before every normal callback of the same flush, regardless of
//!   tree depth.
//! - **normal** — FIFO, filled by lifecycle transitions; subtree callbacks
//!   land before their enclosing ancestor's because child walks complete
//!   first.
//!
//! Flushing consumes the queue, so a queue can never be flushed twice or
//! grow after its flush started. Callbacks that start new passes build
//! their own queues.

use smallvec::SmallVec;

use crate::runtime::Runtime;

/// A queued callback.
pub type Job = Box<dyn FnOnce(&mut Runtime)>;

/// Two-bucket ordered callback buffer. See the module docs for ordering.
#[derive(Default)]
pub struct MountedQueue {
    priority: SmallVec<[Job; 2]>,
    normal: SmallVec<[Job; 8]>,
}

impl MountedQueue {
    /// Create an empty queue for a new entry point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the normal bucket.
    pub fn push(&mut self, job: impl FnOnce(&mut Runtime) + 'static) {
        self.normal.push(Box::new(job));
    }

    /// Append to the priority bucket.
    pub fn push_priority(&mut self, job: impl FnOnce(&mut Runtime) + 'static) {
        self.priority.push(Box::new(job));
    }

    /// Number of buffered callbacks.
    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    /// Check whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.normal.is_empty()
    }

    /// Run every buffered callback: priority bucket first, then normal,
    /// each in push order. Consumes the queue.
    pub fn flush(self, rt: &mut Runtime) {
        for job in self.priority {
            job(rt);
        }
        for job in self.normal {
            job(rt);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_priority_runs_before_normal() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut q = MountedQueue::new();

        for label in ["n1", "n2"] {
            let order = order.clone();
            q.push(move |_| order.borrow_mut().push(label));
        }
        {
            let order = order.clone();
            q.push_priority(move |_| order.borrow_mut().push("p1"));
        }
        assert_eq!(q.len(), 3);

        let mut rt = Runtime::new();
        q.flush(&mut rt);
        assert_eq!(*order.borrow(), vec!["p1", "n1", "n2"]);
    }

    #[test]
    fn test_normal_bucket_is_fifo() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut q = MountedQueue::new();
        for i in 0..5 {
            let order = order.clone();
            q.push(move |_| order.borrow_mut().push(i));
        }

        let mut rt = Runtime::new();
        q.flush(&mut rt);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }
}
