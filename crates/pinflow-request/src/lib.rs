//! pinflow-request: Request/accept/commit handshake for pinning items
//!
//! This crate provides:
//! - `PinRequestProcessor`: validates requests, launches the approver's
//!   confirmation surface and commits accepted pins
//! - `PinRequestToken`: the single-use capability handed to the approver
//! - Collaborator traits (`ApprovalSurfaceLocator`, `SessionState`,
//!   `SurfaceLauncher`, `CallerIdentity`, `ResourceResolver`) with
//!   in-memory implementations
//!
//! # Architecture
//!
//! A request runs in two critical sections on the store lock: the
//! lookup/validate step of `request_pin` and the body of `commit`. The
//! confirmation surface is launched between them, outside the lock, with the
//! caller identity cleared. Acceptance uniqueness is decided under each
//! token's own lock before the store lock is ever taken.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pinflow_request::{PinRequestProcessor, ProcessorConfig, ResultChannel};
//!
//! let processor = PinRequestProcessor::new(store, collaborators, ProcessorConfig::from_env()?);
//! let (channel, mut results) = ResultChannel::new();
//!
//! // Publisher side
//! processor.request_pin(item, Some(channel))?;
//!
//! // Approver side, holding the handle from the launched request
//! if processor.is_valid(&handle) {
//!     processor.accept(&handle, None)?;
//! }
//! ```

pub mod config;
pub mod launch;
pub mod locator;
pub mod processor;
pub mod registry;
pub mod resources;
pub mod result;
pub mod session;
pub mod token;

pub use config::{ConfigError, ProcessorConfig};
pub use launch::{
    CallerIdentity, ClearedIdentity, ConfirmIntent, IdentityToken, LaunchError, PinItemRequest,
    RecordingLauncher, RequestType, SurfaceLauncher, ThreadCallerIdentity,
};
pub use locator::{
    ApprovalSurfaceLocator, ConfirmationSurface, DefaultLauncherLocator, LauncherDirectory,
    StaticDirectory,
};
pub use processor::{Collaborators, PinRequestProcessor};
pub use registry::TokenRegistry;
pub use resources::{ResourceResolver, StringTable, resolve_item_texts};
pub use result::{PinResultNotice, ResultChannel, deliver_result};
pub use session::{SessionState, SessionTable};
pub use token::{PinItemCallback, PinRequestToken, TokenHandle};

// Re-export dependent crates
pub use pinflow_core;
pub use pinflow_store;
