//! Bounded FIFO buffer for frames sent while disconnected

use std::collections::VecDeque;

use crate::frame::Frame;

/// Bounded FIFO of outbound frames.
///
/// When the queue is at capacity the newest enqueue is rejected; frames
/// buffered here are mostly low-value telemetry and acks, so losing the
/// newest under sustained disconnection is the accepted degradation.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<Frame>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, rejecting it when the queue is full.
    /// Returns whether the frame was accepted.
    pub fn push(&mut self, frame: Frame) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_back(frame);
        true
    }

    /// Pop every queued frame in original enqueue order
    pub fn drain(&mut self) -> Vec<Frame> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
