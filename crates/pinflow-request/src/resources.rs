//! Late resolution of externalized item text.
//!
//! Text references are resolved when a request is sent, against the
//! publisher package installed at that moment.

use std::collections::HashMap;
use std::sync::RwLock;

use pinflow_core::{Item, ItemText, PackageName, UserId};

/// Looks up string resources of an installed package.
pub trait ResourceResolver: Send + Sync {
    fn resolve_string(&self, package: &PackageName, user: UserId, id: u32) -> Option<String>;
}

/// Replaces every resource reference in `item` with its current value.
///
/// Unresolvable references are left in place. Returns how many were resolved.
pub fn resolve_item_texts(resolver: &dyn ResourceResolver, item: &mut Item) -> usize {
    let package = item.package.clone();
    let user = item.user;
    let mut resolved = 0;
    for text in item.texts_mut() {
        let ItemText::Resource { id, name } = text else {
            continue;
        };
        match resolver.resolve_string(&package, user, *id) {
            Some(value) => {
                *text = ItemText::Literal { value };
                resolved += 1;
            }
            None => {
                tracing::warn!(
                    package = %package,
                    resource = %name,
                    "Unable to resolve string resource"
                );
            }
        }
    }
    resolved
}

/// In-memory string resources keyed by `(package, user, id)`.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: RwLock<HashMap<(PackageName, UserId, u32), String>>,
}

impl StringTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a string.
    pub fn insert(
        &self,
        package: impl Into<PackageName>,
        user: UserId,
        id: u32,
        value: impl Into<String>,
    ) {
        if let Ok(mut strings) = self.strings.write() {
            strings.insert((package.into(), user, id), value.into());
        }
    }
}

impl ResourceResolver for StringTable {
    fn resolve_string(&self, package: &PackageName, user: UserId, id: u32) -> Option<String> {
        self.strings
            .read()
            .ok()?
            .get(&(package.clone(), user, id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_references() {
        let table = StringTable::new();
        table.insert("com.example.mail", UserId(0), 1, "Compose");

        let mut item = Item::builder("com.example.mail", UserId(0), "s1")
            .short_label(ItemText::resource(1, "label"))
            .long_label(ItemText::resource(2, "long_label"))
            .disabled_message(ItemText::literal("Disabled"))
            .build();

        assert_eq!(resolve_item_texts(&table, &mut item), 1);
        assert_eq!(item.short_label, Some(ItemText::literal("Compose")));
        assert_eq!(item.long_label, Some(ItemText::resource(2, "long_label")));
        assert_eq!(item.disabled_message, Some(ItemText::literal("Disabled")));
    }

    #[test]
    fn resources_are_scoped_per_user() {
        let table = StringTable::new();
        table.insert("com.example.mail", UserId(10), 1, "Work compose");

        let mut item = Item::builder("com.example.mail", UserId(0), "s1")
            .short_label(ItemText::resource(1, "label"))
            .build();
        assert_eq!(resolve_item_texts(&table, &mut item), 0);
    }
}
