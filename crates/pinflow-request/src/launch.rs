//! Launching the approver's confirmation surface.
//!
//! The launch is the only step that leaves the process. It runs with the
//! caller identity cleared, inside a `ClearedIdentity` scope that restores
//! the identity on every exit path.

use std::cell::Cell;
use std::sync::Mutex;

use pinflow_core::{ComponentName, Item, UserId};
use serde::Serialize;
use thiserror::Error;

use crate::token::TokenHandle;

/// Action of the intent that opens a confirmation surface.
pub const ACTION_CONFIRM_PIN_ITEM: &str = "pinflow.action.CONFIRM_PIN_ITEM";

/// Start the surface in a new task.
pub const FLAG_ACTIVITY_NEW_TASK: u32 = 0x1000_0000;

/// Clear any existing task of the surface before starting it.
pub const FLAG_ACTIVITY_CLEAR_TASK: u32 = 0x0000_8000;

/// Kind of item a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Shortcut,
}

/// Payload handed to the approver: the stripped item plus the request handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinItemRequest {
    pub request_type: RequestType,
    pub item: Item,
    pub handle: TokenHandle,
}

/// Intent that starts the confirmation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmIntent {
    pub action: String,
    pub component: ComponentName,
    pub flags: u32,
    pub request: PinItemRequest,
}

impl ConfirmIntent {
    /// Builds the intent for `request`, targeting `component`.
    pub fn new(component: ComponentName, request: PinItemRequest) -> Self {
        Self {
            action: ACTION_CONFIRM_PIN_ITEM.to_string(),
            component,
            flags: FLAG_ACTIVITY_NEW_TASK | FLAG_ACTIVITY_CLEAR_TASK,
            request,
        }
    }
}

/// Failure to start a confirmation surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// No such component is installed.
    #[error("activity not found: {0}")]
    ActivityNotFound(ComponentName),

    /// The target process died while starting.
    #[error("target died: {0}")]
    TargetDied(String),

    /// The platform refused the launch.
    #[error("launch rejected: {0}")]
    Rejected(String),
}

/// Starts components out of process.
pub trait SurfaceLauncher: Send + Sync {
    fn launch(&self, intent: &ConfirmIntent, user: UserId) -> Result<(), LaunchError>;
}

/// Saved caller identity, returned by `clear_calling_identity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityToken(pub Option<u32>);

/// Per-call caller identity, cleared to gain the service's own privileges.
pub trait CallerIdentity: Send + Sync {
    fn clear_calling_identity(&self) -> IdentityToken;
    fn restore_calling_identity(&self, token: IdentityToken);
}

/// Scope in which the caller identity is cleared.
#[must_use = "the identity is restored as soon as the guard is dropped"]
pub struct ClearedIdentity<'a> {
    identity: &'a dyn CallerIdentity,
    saved: IdentityToken,
}

impl<'a> ClearedIdentity<'a> {
    /// Clears the identity until the returned guard is dropped.
    pub fn enter(identity: &'a dyn CallerIdentity) -> Self {
        let saved = identity.clear_calling_identity();
        Self { identity, saved }
    }
}

impl Drop for ClearedIdentity<'_> {
    fn drop(&mut self) {
        self.identity.restore_calling_identity(self.saved);
    }
}

thread_local! {
    static CALLING_UID: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Caller identity tracked per thread, like an IPC thread's calling uid.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCallerIdentity;

impl ThreadCallerIdentity {
    /// Records the uid of the caller served by this thread.
    pub fn set_calling_uid(uid: Option<u32>) {
        CALLING_UID.with(|cell| cell.set(uid));
    }

    /// The uid of the caller served by this thread, `None` when cleared.
    pub fn calling_uid() -> Option<u32> {
        CALLING_UID.with(Cell::get)
    }
}

impl CallerIdentity for ThreadCallerIdentity {
    fn clear_calling_identity(&self) -> IdentityToken {
        IdentityToken(CALLING_UID.with(|cell| cell.replace(None)))
    }

    fn restore_calling_identity(&self, token: IdentityToken) {
        Self::set_calling_uid(token.0);
    }
}

/// Launcher that records every launch instead of starting anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<(ConfirmIntent, UserId)>>,
    failure: Mutex<Option<LaunchError>>,
}

impl RecordingLauncher {
    /// Creates a launcher whose launches succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following launch fail with `error`, or succeed with `None`.
    pub fn set_failure(&self, error: Option<LaunchError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Successful launches so far.
    pub fn launched(&self) -> Vec<(ConfirmIntent, UserId)> {
        self.launched
            .lock()
            .map(|launched| launched.clone())
            .unwrap_or_default()
    }

    /// The most recent successful launch.
    pub fn last(&self) -> Option<(ConfirmIntent, UserId)> {
        self.launched().pop()
    }
}

impl SurfaceLauncher for RecordingLauncher {
    fn launch(&self, intent: &ConfirmIntent, user: UserId) -> Result<(), LaunchError> {
        if let Some(error) = self.failure.lock().ok().and_then(|failure| failure.clone()) {
            return Err(error);
        }
        let mut launched = self
            .launched
            .lock()
            .map_err(|_| {
                LaunchError::Rejected("launcher lock poisoned".to_string())
            })?;
        launched.push((intent.clone(), user));
        Ok(())
    }
}
