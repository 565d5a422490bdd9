//! Main store implementation.
//!
//! The `ItemStore` owns publisher items and approver adoption records behind
//! one mutex. Every mutation goes through a `StoreGuard`, so a lookup,
//! validation and mutation sequence performed on one guard is atomic with
//! respect to every other caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use pinflow_core::{ComponentName, Item, ItemId, PackageName, UserId};

use crate::approver::{ApproverKey, ApproverRecord, PinKey};
use crate::error::{StoreError, StoreResult};
use crate::events::ChangeBroadcaster;

type PublisherKey = (PackageName, UserId);

#[derive(Debug, Default)]
struct StoreState {
    publishers: HashMap<PublisherKey, BTreeMap<ItemId, Item>>,
    approvers: BTreeMap<ApproverKey, ApproverRecord>,
}

impl StoreState {
    fn item(&self, key: &PinKey) -> Option<&Item> {
        self.publishers
            .get(&(key.package.clone(), key.user))
            .and_then(|items| items.get(&key.id))
    }

    fn is_pinned_by_any(&self, key: &PinKey) -> bool {
        self.approvers.values().any(|record| record.contains(key))
    }

    /// Recomputes the pinned flag and drops items nothing holds on to.
    fn refresh_pinned(&mut self, key: &PinKey) {
        let pinned = self.is_pinned_by_any(key);
        let Some(items) = self.publishers.get_mut(&(key.package.clone(), key.user)) else {
            return;
        };
        let Some(item) = items.get_mut(&key.id) else {
            return;
        };
        item.pinned = pinned;
        if !item.pinned && !item.dynamic {
            tracing::debug!(package = %key.package, item_id = %key.id, "Removing orphaned item");
            items.remove(&key.id);
        }
    }
}

/// Lock-guarded store of publisher items and approver pins.
#[derive(Debug, Default)]
pub struct ItemStore {
    state: Mutex<StoreState>,
    changes: ChangeBroadcaster,
}

impl ItemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the store-wide lock.
    pub fn lock(&self) -> StoreResult<StoreGuard<'_>> {
        self.state
            .lock()
            .map(|state| StoreGuard { state })
            .map_err(|_| StoreError::LockPoisoned)
    }

    /// The change broadcaster for this store.
    pub fn changes(&self) -> &ChangeBroadcaster {
        &self.changes
    }

    /// Checks every cross-record invariant.
    ///
    /// Takes the lock on its own; never call it while holding a guard.
    pub fn verify_states(&self) -> StoreResult<()> {
        let guard = self.lock()?;
        let state = &*guard.state;

        for (approver, record) in &state.approvers {
            for pin in &record.pins {
                if state.item(pin).is_none() {
                    return Err(StoreError::Inconsistent(format!(
                        "approver {} pins missing item {}/{}",
                        approver.package, pin.package, pin.id
                    )));
                }
            }
        }

        for ((package, user), items) in &state.publishers {
            for (id, item) in items {
                if &item.id != id || &item.package != package || item.user != *user {
                    return Err(StoreError::Inconsistent(format!(
                        "item {} filed under {package}/{id} (user {user})",
                        item.to_insecure_string()
                    )));
                }
                let key = PinKey::of(item);
                if item.pinned != state.is_pinned_by_any(&key) {
                    return Err(StoreError::Inconsistent(format!(
                        "pinned flag out of sync for {}",
                        item.to_insecure_string()
                    )));
                }
                if !item.dynamic && !item.pinned {
                    return Err(StoreError::Inconsistent(format!(
                        "item is neither dynamic nor pinned: {}",
                        item.to_insecure_string()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Exclusive access to the store for one critical section.
#[derive(Debug)]
pub struct StoreGuard<'a> {
    state: MutexGuard<'a, StoreState>,
}

impl StoreGuard<'_> {
    /// Looks up an item.
    pub fn find_by_id(&self, package: &PackageName, user: UserId, id: &ItemId) -> Option<&Item> {
        self.state.item(&PinKey::new(package.clone(), user, id.clone()))
    }

    /// Adds or replaces an item as a dynamic item.
    ///
    /// The pinned flag is derived from approver records, not taken from the input.
    pub fn upsert_dynamic(&mut self, mut item: Item) {
        let key = PinKey::of(&item);
        item.dynamic = true;
        item.pinned = self.state.is_pinned_by_any(&key);
        tracing::debug!(item = %item.to_insecure_string(), "Upserting dynamic item");
        self.state
            .publishers
            .entry((key.package, key.user))
            .or_default()
            .insert(key.id, item);
    }

    /// Removes the dynamic registration of an item.
    ///
    /// A pinned item survives with its dynamic flag cleared. Returns false if
    /// the item was not dynamic.
    pub fn delete_dynamic(&mut self, package: &PackageName, user: UserId, id: &ItemId) -> bool {
        let key = PinKey::new(package.clone(), user, id.clone());
        let Some(item) = self
            .state
            .publishers
            .get_mut(&(key.package.clone(), user))
            .and_then(|items| items.get_mut(id))
        else {
            return false;
        };
        if !item.dynamic {
            return false;
        }
        item.dynamic = false;
        self.state.refresh_pinned(&key);
        true
    }

    /// Enables or disables an existing item.
    pub fn set_enabled(
        &mut self,
        package: &PackageName,
        user: UserId,
        id: &ItemId,
        enabled: bool,
    ) -> StoreResult<()> {
        let item = self
            .state
            .publishers
            .get_mut(&(package.clone(), user))
            .and_then(|items| items.get_mut(id))
            .ok_or_else(|| StoreError::ItemNotFound {
                package: package.clone(),
                user,
                id: id.clone(),
            })?;
        item.enabled = enabled;
        Ok(())
    }

    /// Renumbers dynamic items `0..n` per owning activity in `(rank, id)` order.
    ///
    /// Non-dynamic items get rank 0.
    pub fn adjust_ranks(&mut self, package: &PackageName, user: UserId) {
        let Some(items) = self.state.publishers.get_mut(&(package.clone(), user)) else {
            return;
        };

        let mut by_activity: BTreeMap<Option<ComponentName>, Vec<(i32, ItemId)>> = BTreeMap::new();
        for item in items.values_mut() {
            if item.dynamic {
                by_activity
                    .entry(item.activity.clone())
                    .or_default()
                    .push((item.rank, item.id.clone()));
            } else {
                item.rank = 0;
            }
        }

        for mut ranked in by_activity.into_values() {
            ranked.sort();
            for (new_rank, (_, id)) in ranked.into_iter().enumerate() {
                if let Some(item) = items.get_mut(&id) {
                    item.rank = i32::try_from(new_rank).unwrap_or(i32::MAX);
                }
            }
        }
    }

    /// Pin bookkeeping for one approver, created on first use.
    pub fn approver(&mut self, key: ApproverKey) -> Approver<'_> {
        self.state.approvers.entry(key.clone()).or_default();
        Approver {
            state: &mut *self.state,
            key,
        }
    }

    /// Read-only view of an approver record.
    pub fn approver_record(&self, key: &ApproverKey) -> Option<&ApproverRecord> {
        self.state.approvers.get(key)
    }
}

/// Pin operations of one approver, borrowed from a `StoreGuard`.
#[derive(Debug)]
pub struct Approver<'g> {
    state: &'g mut StoreState,
    key: ApproverKey,
}

impl Approver<'_> {
    fn record_mut(&mut self) -> &mut ApproverRecord {
        self.state.approvers.entry(self.key.clone()).or_default()
    }

    /// Returns true if this approver has the item pinned.
    pub fn has_pinned(&self, item: &Item) -> bool {
        self.state
            .approvers
            .get(&self.key)
            .is_some_and(|record| record.contains(&PinKey::of(item)))
    }

    /// Adds a pin. The item must already be registered.
    pub fn add_pin(&mut self, package: &PackageName, user: UserId, id: &ItemId) -> StoreResult<()> {
        let pin = PinKey::new(package.clone(), user, id.clone());
        if self.state.item(&pin).is_none() {
            return Err(StoreError::ItemNotFound {
                package: package.clone(),
                user,
                id: id.clone(),
            });
        }
        self.record_mut().pins.insert(pin.clone());
        self.state.refresh_pinned(&pin);
        Ok(())
    }

    /// Removes a pin. Returns false if it was not pinned by this approver.
    pub fn remove_pin(&mut self, package: &PackageName, user: UserId, id: &ItemId) -> bool {
        let pin = PinKey::new(package.clone(), user, id.clone());
        let removed = self.record_mut().pins.remove(&pin);
        if removed {
            self.state.refresh_pinned(&pin);
        }
        removed
    }

    /// Records a pin restored from a previous install.
    pub fn queue_restored_pin(&mut self, pin: PinKey) {
        self.record_mut().pending_restore.insert(pin);
    }

    /// Adopts restored pins whose items now exist. Returns how many were adopted.
    pub fn sync_from_restore(&mut self) -> usize {
        let pending = std::mem::take(&mut self.record_mut().pending_restore);
        if pending.is_empty() {
            return 0;
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|pin| self.state.item(pin).is_some());

        let record = self.record_mut();
        record.pending_restore.extend(waiting);
        record.pins.extend(ready.iter().cloned());
        for pin in &ready {
            self.state.refresh_pinned(pin);
        }

        if !ready.is_empty() {
            tracing::debug!(
                approver = %self.key.package,
                adopted = ready.len(),
                "Restored pending pins"
            );
        }
        ready.len()
    }
}
