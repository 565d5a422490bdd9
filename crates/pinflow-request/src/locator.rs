//! Resolution of the approver and its confirmation surface.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use pinflow_core::{ComponentName, PackageName, UserId};
use serde::Serialize;

/// Where a confirmation UI for a pin request can be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationSurface {
    /// The confirmation component inside the approver package.
    pub component: ComponentName,

    /// The user the approver runs as.
    pub approver_user: UserId,
}

impl ConfirmationSurface {
    /// The approver package.
    pub fn approver_package(&self) -> &PackageName {
        &self.component.package
    }
}

/// Resolves the approver that confirms pin requests for a user.
pub trait ApprovalSurfaceLocator: Send + Sync {
    /// Returns `None` if there is no approver or it has no confirmation surface.
    fn resolve(&self, user: UserId) -> Option<ConfirmationSurface>;
}

/// Device facts the default locator needs.
pub trait LauncherDirectory: Send + Sync {
    /// The profile parent of `user`, or `user` itself.
    fn parent_or_self(&self, user: UserId) -> UserId;

    /// The default launcher of `user`.
    fn default_launcher(&self, user: UserId) -> Option<ComponentName>;

    /// The component in `package` that confirms pin requests.
    fn pin_confirmation_activity(
        &self,
        package: &PackageName,
        user: UserId,
    ) -> Option<ComponentName>;
}

impl<D: LauncherDirectory + ?Sized> LauncherDirectory for Arc<D> {
    fn parent_or_self(&self, user: UserId) -> UserId {
        (**self).parent_or_self(user)
    }

    fn default_launcher(&self, user: UserId) -> Option<ComponentName> {
        (**self).default_launcher(user)
    }

    fn pin_confirmation_activity(
        &self,
        package: &PackageName,
        user: UserId,
    ) -> Option<ComponentName> {
        (**self).pin_confirmation_activity(package, user)
    }
}

/// Locator that asks the default launcher of the parent user.
#[derive(Debug)]
pub struct DefaultLauncherLocator<D> {
    directory: D,
}

impl<D: LauncherDirectory> DefaultLauncherLocator<D> {
    /// Creates a locator over a directory.
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

impl<D: LauncherDirectory> ApprovalSurfaceLocator for DefaultLauncherLocator<D> {
    fn resolve(&self, user: UserId) -> Option<ConfirmationSurface> {
        let approver_user = self.directory.parent_or_self(user);
        let Some(launcher) = self.directory.default_launcher(approver_user) else {
            tracing::error!(user = %approver_user, "Default launcher not found");
            return None;
        };
        let component = self
            .directory
            .pin_confirmation_activity(&launcher.package, approver_user)?;
        Some(ConfirmationSurface {
            component,
            approver_user,
        })
    }
}

/// In-memory directory, configured up front.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    parents: RwLock<HashMap<UserId, UserId>>,
    default_launchers: RwLock<HashMap<UserId, ComponentName>>,
    confirm_activities: RwLock<HashMap<(PackageName, UserId), ComponentName>>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `parent` the profile parent of `profile`.
    pub fn set_parent(&self, profile: UserId, parent: UserId) {
        if let Ok(mut parents) = self.parents.write() {
            parents.insert(profile, parent);
        }
    }

    /// Sets or clears the default launcher of a user.
    pub fn set_default_launcher(&self, user: UserId, launcher: Option<ComponentName>) {
        if let Ok(mut launchers) = self.default_launchers.write() {
            match launcher {
                Some(launcher) => launchers.insert(user, launcher),
                None => launchers.remove(&user),
            };
        }
    }

    /// Registers the confirmation component of a launcher package.
    pub fn set_confirmation_activity(&self, user: UserId, activity: ComponentName) {
        if let Ok(mut activities) = self.confirm_activities.write() {
            activities.insert((activity.package.clone(), user), activity);
        }
    }
}

impl LauncherDirectory for StaticDirectory {
    fn parent_or_self(&self, user: UserId) -> UserId {
        self.parents
            .read()
            .ok()
            .and_then(|parents| parents.get(&user).copied())
            .unwrap_or(user)
    }

    fn default_launcher(&self, user: UserId) -> Option<ComponentName> {
        self.default_launchers.read().ok()?.get(&user).cloned()
    }

    fn pin_confirmation_activity(
        &self,
        package: &PackageName,
        user: UserId,
    ) -> Option<ComponentName> {
        self.confirm_activities
            .read()
            .ok()?
            .get(&(package.clone(), user))
            .cloned()
    }
}
