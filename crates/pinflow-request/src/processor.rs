//! Orchestration of pin requests.
//!
//! `PinRequestProcessor::request_pin` validates a publisher's request,
//! creates a single-use token and launches the approver's confirmation
//! surface. When the approver accepts the token, `commit` re-validates
//! against the current store state and records the pin.
//!
//! The store lock is held for the lookup/validate step of a request and for
//! the whole body of a commit. The surface launch always happens outside it.

use std::sync::Arc;

use pinflow_core::{ComponentName, Item, PackageName, PinError, PinResult, RequestOptions, UserId};
use pinflow_store::{ApproverKey, ItemStore, PinKey};

use crate::config::ProcessorConfig;
use crate::launch::{
    CallerIdentity, ClearedIdentity, ConfirmIntent, PinItemRequest, RequestType, SurfaceLauncher,
};
use crate::locator::{ApprovalSurfaceLocator, ConfirmationSurface};
use crate::registry::TokenRegistry;
use crate::resources::{ResourceResolver, resolve_item_texts};
use crate::result::{ResultChannel, deliver_result};
use crate::session::SessionState;
use crate::token::{PinItemCallback, PinRequestToken, TokenHandle};

/// External collaborators of the processor.
#[derive(Clone)]
pub struct Collaborators {
    pub locator: Arc<dyn ApprovalSurfaceLocator>,
    pub sessions: Arc<dyn SessionState>,
    pub launcher: Arc<dyn SurfaceLauncher>,
    pub identity: Arc<dyn CallerIdentity>,
    pub resources: Arc<dyn ResourceResolver>,
}

/// Outcome of the locked lookup/validate step of a request.
enum Prepared {
    /// The approver already pins the item.
    AlreadyPinned(Item),
    /// A token must be created for this item.
    Send { item: Item, pre_existing: bool },
}

pub(crate) struct ProcessorShared {
    store: Arc<ItemStore>,
    collaborators: Collaborators,
    config: ProcessorConfig,
    registry: TokenRegistry,
}

/// Handles pin requests from publishers and accepts from approvers.
///
/// Cloning is cheap; clones share the same registry of outstanding requests.
#[derive(Clone)]
pub struct PinRequestProcessor {
    shared: Arc<ProcessorShared>,
}

impl PinRequestProcessor {
    /// Creates a processor over a store.
    pub fn new(
        store: Arc<ItemStore>,
        collaborators: Collaborators,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(ProcessorShared {
                store,
                collaborators,
                config,
                registry: TokenRegistry::new(),
            }),
        }
    }

    /// The store this processor commits into.
    pub fn store(&self) -> &Arc<ItemStore> {
        &self.shared.store
    }

    /// Whether an approver with a confirmation surface exists for `user`.
    pub fn is_request_pin_supported(&self, user: UserId) -> bool {
        self.shared.collaborators.locator.resolve(user).is_some()
    }

    /// Asks the approver of the candidate's user to pin it.
    ///
    /// Returns `Ok(true)` once the confirmation surface is launched, or
    /// immediately if the approver already pins the item. Returns `Ok(false)`
    /// without side effects if no approver can serve the request or the launch
    /// fails. Invalid candidates fail with `InvalidArgument` or `IllegalState`;
    /// a locked approver session fails with `SessionLocked`.
    pub fn request_pin(&self, candidate: Item, result: Option<ResultChannel>) -> PinResult<bool> {
        let shared = &self.shared;

        let Some(surface) = shared.collaborators.locator.resolve(candidate.user) else {
            tracing::warn!(
                package = %candidate.package,
                "Approver doesn't support pin requests. Item not created."
            );
            return Ok(false);
        };

        let approver_user = surface.approver_user;
        if !shared.collaborators.sessions.is_unlocked(approver_user) {
            return Err(PinError::SessionLocked(approver_user));
        }

        let approver = ApproverKey::new(
            surface.approver_package().clone(),
            candidate.user,
            approver_user,
        );

        let (item, pre_existing) = match shared.prepare(candidate, &approver)? {
            Prepared::AlreadyPinned(existing) => {
                tracing::info!(
                    package = %existing.package,
                    item_id = %existing.id,
                    approver = %approver.package,
                    "Approver already pins item"
                );
                deliver_result(result.as_ref(), &existing);
                return Ok(true);
            }
            Prepared::Send { item, pre_existing } => (item, pre_existing),
        };

        let token = Arc::new(PinRequestToken::new(
            Arc::downgrade(&self.shared),
            item,
            result,
            approver,
            pre_existing,
        ));
        let handle = shared.registry.insert(Arc::clone(&token))?;

        let request = PinItemRequest {
            request_type: RequestType::Shortcut,
            item: token.item().stripped_for_approver(),
            handle,
        };
        if shared.start_confirm_activity(&surface, request) {
            Ok(true)
        } else {
            shared.registry.remove(&handle);
            Ok(false)
        }
    }

    /// Whether the request behind `handle` can still be accepted.
    pub fn is_valid(&self, handle: &TokenHandle) -> bool {
        self.shared
            .registry
            .get(handle)
            .is_some_and(|token| token.is_valid())
    }

    /// Accepts the request behind `handle` on behalf of the approver.
    ///
    /// The handle is retired once the request has been accepted, whatever
    /// the commit outcome.
    pub fn accept(
        &self,
        handle: &TokenHandle,
        options: Option<&RequestOptions>,
    ) -> PinResult<bool> {
        let token = self.shared.registry.get(handle).ok_or_else(|| {
            PinError::IllegalState(format!("no outstanding request for handle {handle}"))
        })?;
        token.accept(options)
    }

    /// The item snapshot an approver may display for `handle`.
    pub fn request_item(&self, handle: &TokenHandle) -> Option<Item> {
        self.shared
            .registry
            .get(handle)
            .map(|token| token.item().stripped_for_approver())
    }

    /// The live token behind `handle`.
    pub fn callback(&self, handle: &TokenHandle) -> Option<Arc<PinRequestToken>> {
        self.shared.registry.get(handle)
    }

    /// Drops an outstanding request without accepting it.
    pub fn release(&self, handle: &TokenHandle) -> bool {
        self.shared.registry.remove(handle)
    }

    /// Number of requests launched and not yet accepted or released.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.registry.len()
    }
}

impl std::fmt::Debug for PinRequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinRequestProcessor")
            .field("config", &self.shared.config)
            .field("outstanding", &self.shared.registry.len())
            .finish_non_exhaustive()
    }
}

impl ProcessorShared {
    fn validate_existing(item: &Item) -> PinResult<()> {
        // A stale item cannot always be force-enabled, so refuse instead.
        if !item.enabled {
            return Err(PinError::IllegalState(format!(
                "{} already exists but disabled",
                item.to_insecure_string()
            )));
        }
        Ok(())
    }

    fn validate_for_creation(item: &Item) -> PinResult<()> {
        let missing = item.missing_mandatory_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PinError::missing_fields(item.id.as_str(), &missing))
        }
    }

    fn prepare(&self, mut candidate: Item, approver: &ApproverKey) -> PinResult<Prepared> {
        let guard = self.store.lock()?;
        let existing = guard
            .find_by_id(&candidate.package, candidate.user, &candidate.id)
            .cloned();

        tracing::debug!(
            package = %candidate.package,
            exists_already = existing.is_some(),
            item = %candidate.to_insecure_string(),
            "Pin requested"
        );

        match existing {
            Some(existing) => {
                Self::validate_existing(&existing)?;
                let pinned = guard
                    .approver_record(approver)
                    .is_some_and(|record| record.contains(&PinKey::of(&existing)));
                if pinned {
                    return Ok(Prepared::AlreadyPinned(existing));
                }
                let mut item = existing.stripped_for_approver();
                item.pinned = false;
                Ok(Prepared::Send {
                    item,
                    pre_existing: true,
                })
            }
            None => {
                Self::validate_for_creation(&candidate)?;
                // Incoming state flags are never trusted.
                candidate.pinned = false;
                candidate.dynamic = false;
                candidate.enabled = true;
                resolve_item_texts(self.collaborators.resources.as_ref(), &mut candidate);
                tracing::debug!(item = %candidate.to_insecure_string(), "Resolved item");
                Ok(Prepared::Send {
                    item: candidate,
                    pre_existing: false,
                })
            }
        }
    }

    fn start_confirm_activity(
        &self,
        surface: &ConfirmationSurface,
        request: PinItemRequest,
    ) -> bool {
        let intent = ConfirmIntent::new(surface.component.clone(), request);

        let outcome = {
            let _identity = ClearedIdentity::enter(self.collaborators.identity.as_ref());
            self.collaborators
                .launcher
                .launch(&intent, surface.approver_user)
        };
        match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    activity = %surface.component,
                    error = %e,
                    "Unable to start confirmation activity"
                );
                false
            }
        }
    }

    fn placeholder_activity(&self, package: &PackageName) -> ComponentName {
        ComponentName::new(package.clone(), self.config.placeholder_activity.clone())
    }

    /// Drops an accepted token from the registry.
    pub(crate) fn retire(&self, handle: &TokenHandle) {
        self.registry.remove(handle);
    }

    /// Pins the token's item for its approver. Called once per token.
    pub(crate) fn commit(&self, token: &PinRequestToken) -> bool {
        let original = token.item();
        let package = original.package.clone();
        let user = original.user;
        let id = original.id.clone();
        let approver = token.approver().clone();

        {
            let mut guard = match self.store.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::error!(error = %e, "Unable to pin item");
                    return false;
                }
            };

            let sessions = &self.collaborators.sessions;
            if !(sessions.is_unlocked(user) && sessions.is_unlocked(approver.approver_user)) {
                tracing::warn!(
                    user = %user,
                    approver_user = %approver.approver_user,
                    "User is locked now"
                );
                return false;
            }

            // The item may have changed since the request; validate it again.
            let current = guard.find_by_id(&package, user, &id).cloned();
            let validation = match &current {
                Some(current) => Self::validate_existing(current),
                None => Self::validate_for_creation(original),
            };
            if let Err(e) = validation {
                tracing::warn!(package = %package, item_id = %id, "Unable to pin item: {}", e);
                return false;
            }

            // A pinned item must be registered, so create it as dynamic first.
            let materialized = current.is_none();
            if materialized {
                tracing::debug!(item_id = %id, "Temporarily adding item as dynamic");
                let mut item = original.clone();
                if item.activity.is_none() {
                    item.activity = Some(self.placeholder_activity(&package));
                }
                guard.upsert_dynamic(item);
            }

            tracing::debug!(item_id = %id, approver = %approver.package, "Pinning item");
            let mut launcher = guard.approver(approver);
            launcher.sync_from_restore();
            if let Err(e) = launcher.add_pin(&package, user, &id) {
                tracing::error!(item_id = %id, error = %e, "Unable to record pin");
                if materialized {
                    guard.delete_dynamic(&package, user, &id);
                }
                return false;
            }

            if materialized {
                tracing::debug!(item_id = %id, "Removing item as dynamic");
                guard.delete_dynamic(&package, user, &id);
            }

            guard.adjust_ranks(&package, user);
        }

        self.verify_states();
        self.store.changes().items_changed(&package, user);

        true
    }

    fn verify_states(&self) {
        if !self.config.verify_states {
            return;
        }
        if let Err(e) = self.store.verify_states() {
            tracing::error!(error = %e, "State verification failed after commit");
            if self.config.strict_verification {
                panic!("state verification failed: {e}");
            }
        }
    }
}
