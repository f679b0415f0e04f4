//! Priority-ordered dispatch structure.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use super::job::{Job, Priority};

/// A pending job's position in the dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    pub priority: Priority,
    pub sequence: u64,
    pub job_id: String,
}

impl DispatchEntry {
    pub fn for_job(job: &Job) -> Self {
        Self {
            priority: job.priority,
            sequence: job.sequence,
            job_id: job.id.clone(),
        }
    }
}

impl Ord for DispatchEntry {
    /// Greater means dispatched first: higher priority, then the smaller sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .rank()
            .cmp(&other.priority.rank())
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

impl PartialOrd for DispatchEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap of pending jobs with O(1) membership checks.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    heap: BinaryHeap<DispatchEntry>,
    members: HashSet<String>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns `false` if the job is already queued.
    pub fn push(&mut self, entry: DispatchEntry) -> bool {
        if !self.members.insert(entry.job_id.clone()) {
            return false;
        }
        self.heap.push(entry);
        true
    }

    /// Take the next job to dispatch.
    pub fn pop(&mut self) -> Option<DispatchEntry> {
        let entry = self.heap.pop()?;
        self.members.remove(&entry.job_id);
        Some(entry)
    }

    /// Drop a job from the queue. Returns `false` if it was not queued.
    pub fn remove(&mut self, job_id: &str) -> bool {
        if !self.members.remove(job_id) {
            return false;
        }
        self.heap.retain(|entry| entry.job_id != job_id);
        true
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.members.contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
