//! Result notifications sent back to the requester.

use chrono::{DateTime, Utc};
use pinflow_core::{Item, ItemId, PackageName, UserId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Sent to the requester once its item is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinResultNotice {
    /// The publisher package.
    pub package: PackageName,
    /// The publisher user.
    pub user: UserId,
    /// The pinned item.
    pub item_id: ItemId,
    /// When the notice was sent.
    pub delivered_at: DateTime<Utc>,
}

/// Fire-and-forget channel to the original requester.
#[derive(Debug, Clone)]
pub struct ResultChannel {
    sender: mpsc::UnboundedSender<PinResultNotice>,
}

impl ResultChannel {
    /// Creates a channel and the receiving end kept by the requester.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PinResultNotice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, notice: PinResultNotice) {
        if self.sender.send(notice).is_err() {
            tracing::debug!("Requester went away before the result was delivered");
        }
    }
}

/// Delivers the result for `item`. No-op without a channel.
pub fn deliver_result(channel: Option<&ResultChannel>, item: &Item) {
    let Some(channel) = channel else {
        return;
    };
    tracing::debug!(package = %item.package, item_id = %item.id, "Sending result");
    channel.send(PinResultNotice {
        package: item.package.clone(),
        user: item.user,
        item_id: item.id.clone(),
        delivered_at: Utc::now(),
    });
}
