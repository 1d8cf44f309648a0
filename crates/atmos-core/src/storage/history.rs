use heapless::Deque;

use super::{HISTORY_CAPACITY, Sample};

/// Rolling log of the most recent samples, oldest first.
///
/// Each slot holds a whole [`Sample`], so an eviction always drops every
/// field of the oldest record together.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    samples: Deque<Sample, HISTORY_CAPACITY>,
}

impl HistoryBuffer {
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
        }
    }

    /// Append the newest sample, returning the record evicted to make room.
    pub fn append(&mut self, sample: Sample) -> Option<Sample> {
        let evicted = if self.samples.is_full() {
            self.samples.pop_front()
        } else {
            None
        };

        let pushed = self.samples.push_back(sample);
        debug_assert!(pushed.is_ok(), "history has room after eviction");
        evicted
    }

    /// Copy of the retained samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
