//! Registry of live request tokens, addressed by opaque handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pinflow_core::{PinError, PinResult};

use crate::token::{PinRequestToken, TokenHandle};

/// Maps handles given to approvers onto live tokens.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: Mutex<HashMap<TokenHandle, Arc<PinRequestToken>>>,
}

impl TokenRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token under its handle.
    pub fn insert(&self, token: Arc<PinRequestToken>) -> PinResult<TokenHandle> {
        let handle = token.handle();
        let mut tokens = self.tokens.lock().map_err(|e| {
            tracing::warn!("Failed to register request: lock poisoned: {}", e);
            PinError::IllegalState("request registry lock poisoned".to_string())
        })?;
        tokens.insert(handle, token);
        Ok(handle)
    }

    /// Looks up a live token.
    pub fn get(&self, handle: &TokenHandle) -> Option<Arc<PinRequestToken>> {
        self.tokens.lock().ok()?.get(handle).cloned()
    }

    /// Drops a token. Returns false if it was not registered.
    pub fn remove(&self, handle: &TokenHandle) -> bool {
        self.tokens
            .lock()
            .map(|mut tokens| tokens.remove(handle).is_some())
            .unwrap_or(false)
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.tokens.lock().map(|tokens| tokens.len()).unwrap_or(0)
    }

    /// Returns true if no token is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
