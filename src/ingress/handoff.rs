//! Single-slot handoff between the ingress path and the motor task
//!
//! The slot carries the *current* desired position, not a work queue: a
//! write replaces whatever the consumer has not picked up yet. The value is
//! one atomic byte, so a concurrent read sees either the old or the new
//! position, never a mix.

use super::position::BlindPosition;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;

const EMPTY: u8 = u8::MAX;

/// Overwriting single-capacity cell shared by one producer and one consumer
#[derive(Debug)]
pub struct PositionHandoff {
    slot: AtomicU8,
    notify: Notify,
}

impl PositionHandoff {
    pub fn new() -> Self {
        Self {
            slot: AtomicU8::new(EMPTY),
            notify: Notify::new(),
        }
    }

    /// Store `position`, never blocking.
    ///
    /// Returns the unread value that was replaced, if any.
    pub fn write(&self, position: BlindPosition) -> Option<BlindPosition> {
        let previous = self.slot.swap(position.percent(), Ordering::AcqRel);
        self.notify.notify_one();
        BlindPosition::new(previous)
    }

    /// Take the pending value, leaving the slot empty
    pub fn read(&self) -> Option<BlindPosition> {
        BlindPosition::new(self.slot.swap(EMPTY, Ordering::AcqRel))
    }

    /// Look at the pending value without consuming it
    pub fn peek(&self) -> Option<BlindPosition> {
        BlindPosition::new(self.slot.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.peek().is_none()
    }

    /// Wait until a value is available and take it.
    ///
    /// Intended for a single consumer task.
    pub async fn recv(&self) -> BlindPosition {
        loop {
            if let Some(position) = self.read() {
                return position;
            }
            self.notify.notified().await;
        }
    }
}

impl Default for PositionHandoff {
    fn default() -> Self {
        Self::new()
    }
}
