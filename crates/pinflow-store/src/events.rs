//! Change notifications for publisher item sets.
//!
//! Uses `tokio::sync::broadcast` so any number of listeners (approvers
//! refreshing their UI, tests) can follow changes. Sending never blocks and
//! never fails the caller; with no subscribers the event is dropped.

use chrono::{DateTime, Utc};
use pinflow_core::{PackageName, UserId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity for the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// The items of one publisher changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemsChanged {
    /// The publisher package.
    pub package: PackageName,
    /// The publisher user.
    pub user: UserId,
    /// When the change was published.
    pub timestamp: DateTime<Utc>,
}

/// Publishes `ItemsChanged` events.
#[derive(Debug, Clone)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<ItemsChanged>,
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBroadcaster {
    /// Create a broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broadcaster with custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemsChanged> {
        self.sender.subscribe()
    }

    /// Publish a change for a publisher/user pair.
    pub fn items_changed(&self, package: &PackageName, user: UserId) {
        let event = ItemsChanged {
            package: package.clone(),
            user,
            timestamp: Utc::now(),
        };
        if self.sender.send(event).is_err() {
            tracing::trace!(package = %package, user = %user, "No change subscribers");
        }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
