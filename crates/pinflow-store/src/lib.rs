//! pinflow-store: Item store for the pin request workflow
//!
//! This crate provides:
//! - Publisher items (dynamic and pinned) keyed by `(package, user, id)`
//! - Approver adoption records with pending-restore bookkeeping
//! - Rank normalization and a full consistency self-check
//! - Change notifications via a broadcast channel
//!
//! # Architecture
//!
//! All state sits behind one store-wide mutex. Callers acquire a
//! `StoreGuard` with `ItemStore::lock` and perform their whole
//! lookup/validate/mutate sequence on it, which makes the sequence atomic.
//!
//! # Usage
//!
//! ```
//! use pinflow_core::{Item, ItemText, LaunchIntent, UserId};
//! use pinflow_store::{ApproverKey, ItemStore};
//!
//! let store = ItemStore::new();
//! let mut guard = store.lock()?;
//!
//! let item = Item::builder("com.example.mail", UserId(0), "compose")
//!     .short_label(ItemText::literal("Compose"))
//!     .intent(LaunchIntent::new("COMPOSE"))
//!     .build();
//! guard.upsert_dynamic(item.clone());
//!
//! let launcher = ApproverKey::new("com.example.launcher", UserId(0), UserId(0));
//! guard.approver(launcher).add_pin(&item.package, item.user, &item.id)?;
//! drop(guard);
//!
//! store.verify_states()?;
//! # Ok::<(), pinflow_store::StoreError>(())
//! ```

pub mod approver;
pub mod error;
pub mod events;
pub mod store;

pub use approver::{ApproverKey, ApproverRecord, PinKey};
pub use error::{StoreError, StoreResult};
pub use events::{ChangeBroadcaster, ItemsChanged};
pub use store::{Approver, ItemStore, StoreGuard};

// Re-export pinflow-core for downstream crates
pub use pinflow_core;
