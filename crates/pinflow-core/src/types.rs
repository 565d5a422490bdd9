//! Core data types for the pin request workflow.
//!
//! This module defines the values that travel between a publisher, the
//! item store and an approver:
//!
//! - Identifiers for users, packages and items
//! - Component names addressing a class inside a package
//! - The `Item` (shortcut) record with its provenance flags
//! - Externalized text that is resolved late, at send time
//!
//! All types derive `Debug`, `Clone`, `Serialize`, and `Deserialize` for
//! inspection, copying, and JSON serialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

// ============================================================================
// ID Types
// ============================================================================

/// Identifier of a user (session owner) on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Name of an installed application package (publisher or approver).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(pub String);

impl PackageName {
    /// Creates a package name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Publisher-chosen identifier of an item, unique within one publisher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Creates an item id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Addresses one component (activity) inside a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    /// The package that declares the component.
    pub package: PackageName,

    /// Fully qualified class name of the component.
    pub class: String,
}

impl ComponentName {
    /// Creates a component name.
    #[must_use]
    pub fn new(package: impl Into<PackageName>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

// ============================================================================
// Item Payload Types
// ============================================================================

/// Text shown for an item, either literal or owned by the publisher's resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemText {
    /// Concrete text.
    Literal { value: String },
    /// Reference into the publisher's string resources, resolved at send time.
    Resource { id: u32, name: String },
}

impl ItemText {
    /// Creates literal text.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Creates a resource reference.
    #[must_use]
    pub fn resource(id: u32, name: impl Into<String>) -> Self {
        Self::Resource {
            id,
            name: name.into(),
        }
    }

    /// Returns the literal value, if resolved.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal { value } => Some(value),
            Self::Resource { .. } => None,
        }
    }

    /// Returns true if this is an empty literal.
    ///
    /// Unresolved references count as present.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Literal { value } if value.trim().is_empty())
    }
}

/// What the approver launches when the user taps a pinned item.
///
/// Private to the publisher's trust domain; never handed to an approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchIntent {
    /// Intent action.
    pub action: String,

    /// Optional data URI.
    pub data: Option<String>,

    /// Extra key/value pairs.
    pub extras: BTreeMap<String, String>,
}

impl LaunchIntent {
    /// Creates an intent with the given action and no data or extras.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
            extras: BTreeMap::new(),
        }
    }
}

/// Icon attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Icon {
    /// Drawable resource inside the publisher package.
    Resource { id: u32 },
    /// Raw encoded bitmap bytes.
    Bitmap { bytes: Vec<u8> },
}

// ============================================================================
// Item
// ============================================================================

/// A publisher-owned item (shortcut) that an approver may adopt.
///
/// Identified by `(package, user, id)`. An item can be dynamic (listed by its
/// publisher), pinned (adopted by at least one approver), or both at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Publisher-chosen id.
    pub id: ItemId,

    /// The publisher package.
    pub package: PackageName,

    /// The user the publisher runs as.
    pub user: UserId,

    /// Owning activity inside the publisher, if known.
    pub activity: Option<ComponentName>,

    /// Short label, mandatory when the item is created through a pin request.
    pub short_label: Option<ItemText>,

    /// Long label.
    pub long_label: Option<ItemText>,

    /// Message shown while the item is disabled.
    pub disabled_message: Option<ItemText>,

    /// Launch intents, last one is the one started.
    pub intents: Vec<LaunchIntent>,

    /// Icon payload.
    pub icon: Option<Icon>,

    /// Publisher-private extras.
    pub extras: BTreeMap<String, String>,

    /// Ordering among dynamic items of the same activity.
    pub rank: i32,

    /// Whether the item can currently be launched or pinned.
    pub enabled: bool,

    /// Listed by the publisher as a dynamic item.
    pub dynamic: bool,

    /// Adopted by at least one approver.
    pub pinned: bool,
}

impl Item {
    /// Creates a builder for constructing an Item.
    #[must_use]
    pub fn builder(
        package: impl Into<PackageName>,
        user: UserId,
        id: impl Into<ItemId>,
    ) -> ItemBuilder {
        ItemBuilder::new(package.into(), user, id.into())
    }

    /// Returns a copy safe to hand to a different trust domain.
    ///
    /// Launch intents, icon payload and extras are dropped.
    #[must_use]
    pub fn stripped_for_approver(&self) -> Item {
        Item {
            intents: Vec::new(),
            icon: None,
            extras: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Names of the fields an item must carry to be created by a pin request.
    ///
    /// Returns an empty list when the item is complete.
    #[must_use]
    pub fn missing_mandatory_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_empty() {
            missing.push("id");
        }
        if self.intents.is_empty() {
            missing.push("intents");
        }
        if self.short_label.as_ref().is_none_or(ItemText::is_blank) {
            missing.push("short_label");
        }
        missing
    }

    /// Mutable access to every externalized text field.
    pub fn texts_mut(&mut self) -> impl Iterator<Item = &mut ItemText> {
        [
            self.short_label.as_mut(),
            self.long_label.as_mut(),
            self.disabled_message.as_mut(),
        ]
        .into_iter()
        .flatten()
    }

    /// Summary for logs. Never includes intents, labels or extras.
    #[must_use]
    pub fn to_insecure_string(&self) -> String {
        format!(
            "Item {{id={}, package={}, user={}, activity={}, rank={}, flags=[{}{}{}]}}",
            self.id,
            self.package,
            self.user,
            self.activity
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            self.rank,
            if self.enabled { "E" } else { "D" },
            if self.dynamic { "d" } else { "" },
            if self.pinned { "p" } else { "" },
        )
    }
}

/// Builder for constructing Item instances.
#[derive(Debug)]
pub struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    fn new(package: PackageName, user: UserId, id: ItemId) -> Self {
        Self {
            item: Item {
                id,
                package,
                user,
                activity: None,
                short_label: None,
                long_label: None,
                disabled_message: None,
                intents: Vec::new(),
                icon: None,
                extras: BTreeMap::new(),
                rank: 0,
                enabled: true,
                dynamic: false,
                pinned: false,
            },
        }
    }

    /// Sets the owning activity.
    #[must_use]
    pub fn activity(mut self, activity: ComponentName) -> Self {
        self.item.activity = Some(activity);
        self
    }

    /// Sets the short label.
    #[must_use]
    pub fn short_label(mut self, label: ItemText) -> Self {
        self.item.short_label = Some(label);
        self
    }

    /// Sets the long label.
    #[must_use]
    pub fn long_label(mut self, label: ItemText) -> Self {
        self.item.long_label = Some(label);
        self
    }

    /// Sets the disabled message.
    #[must_use]
    pub fn disabled_message(mut self, message: ItemText) -> Self {
        self.item.disabled_message = Some(message);
        self
    }

    /// Appends a launch intent.
    #[must_use]
    pub fn intent(mut self, intent: LaunchIntent) -> Self {
        self.item.intents.push(intent);
        self
    }

    /// Sets the icon.
    #[must_use]
    pub fn icon(mut self, icon: Icon) -> Self {
        self.item.icon = Some(icon);
        self
    }

    /// Adds an extra.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.item.extras.insert(key.into(), value.into());
        self
    }

    /// Sets the rank.
    #[must_use]
    pub fn rank(mut self, rank: i32) -> Self {
        self.item.rank = rank;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.item.enabled = enabled;
        self
    }

    /// Sets the dynamic flag.
    #[must_use]
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.item.dynamic = dynamic;
        self
    }

    /// Builds the Item.
    #[must_use]
    pub fn build(self) -> Item {
        self.item
    }
}

// ============================================================================
// Tests
// ============================================================================
