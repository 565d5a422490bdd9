//! pinflow-core: Core types for the pin request workflow
//!
//! This crate provides:
//! - Identifier newtypes (`UserId`, `PackageName`, `ItemId`) and `ComponentName`
//! - The `Item` (shortcut) record and its builder
//! - `RequestOptions` with the trust-boundary transportability check
//! - The `PinError` taxonomy used by every entry point
//!
//! # Usage
//!
//! ```
//! use pinflow_core::{Item, ItemText, LaunchIntent, UserId};
//!
//! let item = Item::builder("com.example.mail", UserId(0), "compose")
//!     .short_label(ItemText::literal("Compose"))
//!     .intent(LaunchIntent::new("com.example.mail.COMPOSE"))
//!     .build();
//!
//! assert!(item.missing_mandatory_fields().is_empty());
//! assert!(item.stripped_for_approver().intents.is_empty());
//! ```

pub mod error;
pub mod options;
pub mod types;

pub use error::{PinError, PinResult};
pub use options::{OptionValue, RequestOptions};
pub use types::{
    ComponentName, Icon, Item, ItemBuilder, ItemId, ItemText, LaunchIntent, PackageName, UserId,
};
