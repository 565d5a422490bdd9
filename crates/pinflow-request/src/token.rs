//! Single-use request tokens.
//!
//! A token is created for every request that reaches the approver. It can be
//! accepted exactly once: the accepted flag is flipped under the token's own
//! lock before any commit work starts, so concurrent accepts never both reach
//! the store-wide lock. A failed commit still burns the token.

use std::fmt;
use std::sync::{Mutex, Weak};

use pinflow_core::{Item, PinError, PinResult, RequestOptions};
use pinflow_store::ApproverKey;
use serde::Serialize;
use uuid::Uuid;

use crate::processor::ProcessorShared;
use crate::result::{ResultChannel, deliver_result};

/// Opaque reference to a live request, safe to hand to the approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenHandle(Uuid);

impl TokenHandle {
    /// Creates a new random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the holder of a request reference may do with it.
pub trait PinItemCallback: Send + Sync {
    /// True until the request is accepted.
    fn is_valid(&self) -> bool;

    /// Accepts the request and pins the item.
    ///
    /// Returns the commit outcome. Fails with `InvalidArgument` for options
    /// that cannot cross the trust boundary and with `IllegalState` when
    /// called again.
    fn accept(&self, options: Option<&RequestOptions>) -> PinResult<bool>;
}

/// One outstanding pin request.
pub struct PinRequestToken {
    handle: TokenHandle,
    processor: Weak<ProcessorShared>,
    item: Item,
    result: Option<ResultChannel>,
    approver: ApproverKey,
    pre_existing: bool,
    accepted: Mutex<bool>,
}

impl PinRequestToken {
    pub(crate) fn new(
        processor: Weak<ProcessorShared>,
        item: Item,
        result: Option<ResultChannel>,
        approver: ApproverKey,
        pre_existing: bool,
    ) -> Self {
        Self {
            handle: TokenHandle::new(),
            processor,
            item,
            result,
            approver,
            pre_existing,
            accepted: Mutex::new(false),
        }
    }

    /// The external reference to this request.
    pub fn handle(&self) -> TokenHandle {
        self.handle
    }

    /// The item as captured at request time.
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// The approver the request was sent to.
    pub fn approver(&self) -> &ApproverKey {
        &self.approver
    }

    /// Whether the item existed when the request was made.
    pub fn is_pre_existing(&self) -> bool {
        self.pre_existing
    }

    /// Flips the accepted flag. Fails if it was already set.
    fn burn(&self) -> PinResult<()> {
        let mut accepted = self
            .accepted
            .lock()
            .map_err(|_| {
                PinError::IllegalState("request lock poisoned".to_string())
            })?;
        if *accepted {
            return Err(PinError::IllegalState(
                "accept() called already".to_string(),
            ));
        }
        *accepted = true;
        Ok(())
    }
}

impl PinItemCallback for PinRequestToken {
    fn is_valid(&self) -> bool {
        // TODO: invalidate outstanding requests when the same publisher issues a new one.
        self.accepted
            .lock()
            .map(|accepted| !*accepted)
            .unwrap_or(false)
    }

    fn accept(&self, options: Option<&RequestOptions>) -> PinResult<bool> {
        if let Some(options) = options {
            options.ensure_transportable()?;
        }
        self.burn()?;

        tracing::debug!(
            token = %self.handle,
            package = %self.item.package,
            item_id = %self.item.id,
            options = options.map_or(0, RequestOptions::len),
            "Approver accepted item"
        );

        let Some(processor) = self.processor.upgrade() else {
            tracing::warn!(token = %self.handle, "Processor is gone; request cannot be committed");
            return Ok(false);
        };

        processor.retire(&self.handle);
        if processor.commit(self) {
            deliver_result(self.result.as_ref(), &self.item);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl fmt::Debug for PinRequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinRequestToken")
            .field("handle", &self.handle)
            .field("item", &self.item.to_insecure_string())
            .field("approver", &self.approver)
            .field("pre_existing", &self.pre_existing)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinflow_core::{OptionValue, UserId};

    fn orphan_token() -> PinRequestToken {
        PinRequestToken::new(
            Weak::new(),
            Item::builder("com.example", UserId(0), "s1").build(),
            None,
            ApproverKey::new("com.example.launcher", UserId(0), UserId(0)),
            false,
        )
    }

    #[test]
    fn fresh_token_is_valid() {
        let token = orphan_token();
        assert!(token.is_valid());
        assert!(!token.is_pre_existing());
    }

    #[test]
    fn untransportable_options_leave_token_valid() {
        let token = orphan_token();
        let options = RequestOptions::new().with(
            "parcel",
            OptionValue::Foreign {
                type_name: "Private".to_string(),
            },
        );

        let err = token.accept(Some(&options)).unwrap_err();
        assert!(matches!(err, PinError::InvalidArgument(_)));
        assert!(token.is_valid());
    }

    #[test]
    fn accept_without_processor_burns_token() {
        let token = orphan_token();
        assert_eq!(token.accept(None), Ok(false));
        assert!(!token.is_valid());
    }

    #[test]
    fn second_accept_is_illegal_state() {
        let token = orphan_token();
        let _ = token.accept(None);
        assert!(matches!(token.accept(None), Err(PinError::IllegalState(_))));
    }

    #[test]
    fn handles_are_unique() {
        assert_ne!(orphan_token().handle(), orphan_token().handle());
    }
}
