//! Adoption records kept on behalf of approvers.

use std::collections::BTreeSet;

use pinflow_core::{Item, ItemId, PackageName, UserId};
use serde::Serialize;

/// Identifies one approver's view of one publisher user's items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ApproverKey {
    /// The approver package.
    pub package: PackageName,

    /// The user whose items the approver adopts.
    pub owner_user: UserId,

    /// The user the approver runs as.
    pub approver_user: UserId,
}

impl ApproverKey {
    /// Creates a key.
    #[must_use]
    pub fn new(package: impl Into<PackageName>, owner_user: UserId, approver_user: UserId) -> Self {
        Self {
            package: package.into(),
            owner_user,
            approver_user,
        }
    }
}

/// Full address of an item: `(publisher, user, id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PinKey {
    pub package: PackageName,
    pub user: UserId,
    pub id: ItemId,
}

impl PinKey {
    /// Creates a key.
    #[must_use]
    pub fn new(package: impl Into<PackageName>, user: UserId, id: impl Into<ItemId>) -> Self {
        Self {
            package: package.into(),
            user,
            id: id.into(),
        }
    }

    /// The key addressing an item.
    #[must_use]
    pub fn of(item: &Item) -> Self {
        Self {
            package: item.package.clone(),
            user: item.user,
            id: item.id.clone(),
        }
    }
}

/// Pins held by one approver.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApproverRecord {
    /// Items the approver has adopted.
    pub(crate) pins: BTreeSet<PinKey>,

    /// Pins restored from a previous install, waiting for their items.
    pub(crate) pending_restore: BTreeSet<PinKey>,
}

impl ApproverRecord {
    /// Returns true if the item is pinned.
    #[must_use]
    pub fn contains(&self, key: &PinKey) -> bool {
        self.pins.contains(key)
    }

    /// Pins waiting for restore.
    #[must_use]
    pub fn pending_restore_count(&self) -> usize {
        self.pending_restore.len()
    }
}
