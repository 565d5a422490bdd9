//! User session state.

use std::collections::HashSet;
use std::sync::RwLock;

use pinflow_core::UserId;

/// Tells whether a user's session is unlocked and running.
pub trait SessionState: Send + Sync {
    fn is_unlocked(&self, user: UserId) -> bool;
}

/// Set of unlocked users.
#[derive(Debug, Default)]
pub struct SessionTable {
    unlocked: RwLock<HashSet<UserId>>,
}

impl SessionTable {
    /// Creates a table with the given users unlocked.
    pub fn with_unlocked(users: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            unlocked: RwLock::new(users.into_iter().collect()),
        }
    }

    /// Marks a user unlocked.
    pub fn unlock(&self, user: UserId) {
        if let Ok(mut unlocked) = self.unlocked.write() {
            unlocked.insert(user);
        }
    }

    /// Marks a user locked.
    pub fn lock(&self, user: UserId) {
        if let Ok(mut unlocked) = self.unlocked.write() {
            unlocked.remove(&user);
        }
    }
}

impl SessionState for SessionTable {
    fn is_unlocked(&self, user: UserId) -> bool {
        self.unlocked
            .read()
            .map(|unlocked| unlocked.contains(&user))
            .unwrap_or(false)
    }
}
