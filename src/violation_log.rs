//! Bounded, newest-first violation log.
//!
//! Events from one cycle are prepended as a batch, keeping their emission
//! order. When the log is over capacity the oldest entries are dropped.

use std::collections::VecDeque;

use serde::Serialize;

use crate::classifier::ViolationEvent;

pub const DEFAULT_LOG_CAPACITY: usize = 20;

#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct ViolationLog {
    entries: VecDeque<ViolationEvent>,
    #[serde(skip)]
    capacity: usize,
}

impl ViolationLog {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend one cycle's events. Returns how many entries were evicted.
    pub fn record(&mut self, events: &[ViolationEvent]) -> usize {
        for event in events.iter().rev() {
            self.entries.push_front(event.clone());
        }
        let evicted = self.entries.len().saturating_sub(self.capacity);
        self.entries.truncate(self.capacity);
        evicted
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ViolationEvent> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ViolationEvent> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<ViolationEvent> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
