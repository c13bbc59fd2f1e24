//! Bounded priority queue of task ids
//!
//! Higher priority pops first; equal priorities pop in submission order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::tasks::{TaskId, TaskPriority};
use crate::{Error, Result};

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    rank: u8,
    seq: u64,
    task_id: TaskId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            // Earlier submissions are "greater" so the max-heap yields them first
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct PriorityQueue {
    heap: BinaryHeap<Entry>,
    capacity: usize,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
        }
    }

    /// Enqueue a task id
    ///
    /// # Errors
    /// `QueueFull` when `capacity` ids are already queued
    pub fn push(&mut self, task_id: TaskId, priority: TaskPriority) -> Result<()> {
        if self.is_full() {
            return Err(Error::QueueFull(self.capacity));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            rank: priority.rank(),
            seq,
            task_id,
        });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TaskId> {
        self.heap.pop().map(|entry| entry.task_id)
    }

    /// Whether `task_id` is still waiting to be popped
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.heap.iter().any(|entry| &entry.task_id == task_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut queue = PriorityQueue::new(10);
        queue.push(id("low"), TaskPriority::Low).unwrap();
        queue.push(id("med-1"), TaskPriority::Medium).unwrap();
        queue.push(id("crit"), TaskPriority::Critical).unwrap();
        queue.push(id("med-2"), TaskPriority::Medium).unwrap();
        queue.push(id("high"), TaskPriority::High).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|t| t.0).collect();
        assert_eq!(order, vec!["crit", "high", "med-1", "med-2", "low"]);
    }

    #[test]
    fn test_capacity() {
        let mut queue = PriorityQueue::new(2);
        queue.push(id("a"), TaskPriority::Low).unwrap();
        queue.push(id("b"), TaskPriority::Low).unwrap();
        assert!(queue.is_full());

        let err = queue.push(id("c"), TaskPriority::Critical).unwrap_err();
        assert!(matches!(err, Error::QueueFull(2)));

        assert!(queue.contains(&id("a")));
        queue.pop();
        assert!(!queue.contains(&id("a")));
        assert!(queue.push(id("c"), TaskPriority::Critical).is_ok());
        assert_eq!(queue.len(), 2);
    }
}
