//! Bounded holding area for inbound frames.

use std::collections::VecDeque;

use bytes::Bytes;

/// FIFO of inbound frames received before the live session is ready.
///
/// When full, the incoming frame is rejected so the held prefix stays a
/// contiguous run of the earliest frames.
#[derive(Debug)]
pub struct InboundBuffer {
    frames: VecDeque<Bytes>,
    capacity: usize,
    dropped: u64,
}

impl InboundBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Append a frame. Returns `false` if the buffer is full and the frame was dropped.
    pub fn push(&mut self, frame: Bytes) -> bool {
        if self.frames.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.frames.push_back(frame);
        true
    }

    /// Remove all frames in arrival order.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, Bytes> {
        self.frames.drain(..)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames rejected because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
