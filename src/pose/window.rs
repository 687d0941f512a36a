//! Rolling window of recent pose frames.

use std::collections::VecDeque;

use super::keypoint::PoseFrame;

/// Bounded, chronologically ordered buffer of the most recent frames.
pub struct FrameWindow {
    frames: VecDeque<PoseFrame>,
    capacity: usize,
}

impl FrameWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a frame, evicting the oldest once full
    pub fn push(&mut self, frame: PoseFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn latest(&self) -> Option<&PoseFrame> {
        self.frames.back()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PoseFrame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
