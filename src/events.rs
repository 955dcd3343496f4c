//! In-process change notifications.
//!
//! Objects and queries publish typed events on a broadcast bus. Publishing never blocks and
//! succeeds without subscribers; slow subscribers observe `Lagged` and skip ahead.

use crate::notification::Notification;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Broadcast bus for one entity
#[derive(Debug)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn emit(&self, event: E) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Query change events
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// Rows, paging and selection were cleared
    Reset,
    /// Rows were stored at `start..start + count`
    RowsAdded { start: usize, count: usize },
    SelectionChanged { selected: usize },
    NotificationChanged(Option<Notification>),
    /// Something changed; re-read the query
    Changed,
}

/// Business object change events
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEvent {
    AttributeChanged { name: String },
    EditStateChanged { in_edit: bool },
    DirtyChanged { dirty: bool },
    NotificationChanged(Option<Notification>),
    Refreshed,
}
