use std::collections::VecDeque;
use vigil_common::types::{Labels, Sample};

/// Fixed-capacity ring buffer of the most recent samples of one metric.
/// The oldest sample is evicted first once the buffer is full.
#[derive(Debug)]
pub struct SampleHistory {
    buffer: VecDeque<Sample>,
    max_size: usize,
}

impl SampleHistory {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.buffer.len() >= self.max_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(sample);
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> {
        self.buffer.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.buffer.back()
    }

    /// Most recent sample carrying exactly `labels`.
    pub fn latest_for(&self, labels: &Labels) -> Option<&Sample> {
        self.buffer.iter().rev().find(|s| &s.labels == labels)
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
