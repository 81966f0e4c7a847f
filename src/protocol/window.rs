//! Bounded stability window for phase 3.

use std::collections::VecDeque;

use crate::observation::Point;

/// FIFO of the most recent consecutive qualifying samples.
///
/// Holds at most `capacity` entries. Only localized detections are stored;
/// the caller clears the window when a frame has no centroid.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    capacity: usize,
    samples: VecDeque<Point>,
}

impl StabilityWindow {
    /// Creates an empty window. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a sample, evicting the oldest when full. Returns the new length.
    pub fn push(&mut self, centroid: Point) -> usize {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(centroid);
        self.samples.len()
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of consecutive samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` once the run reaches capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Most recent centroid, if any sample is held.
    #[must_use]
    pub fn last_centroid(&self) -> Option<Point> {
        self.samples.back().copied()
    }
}
