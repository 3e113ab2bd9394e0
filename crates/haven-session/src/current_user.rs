// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The signed-in user joined with their profile row.

use haven_core::types::Profile;
use haven_core::{DirectoryStore, HavenError, Role, Session, UserId};
use tracing::warn;

use crate::coordinator::SessionCoordinator;

/// Who is using the client right now.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub session: Session,
    /// `None` when the profile row is missing or could not be read.
    pub profile: Option<Profile>,
}

impl CurrentUser {
    /// Resolves the current user through the coordinator.
    ///
    /// Returns `Ok(None)` when nobody is signed in. A failed profile lookup is
    /// logged and tolerated; a failed session refresh is returned.
    pub async fn resolve(
        coordinator: &SessionCoordinator,
        directory: &dyn DirectoryStore,
    ) -> Result<Option<Self>, HavenError> {
        let session = match coordinator.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(e) => return Err(HavenError::auth(format!("session unavailable: {e}"))),
        };

        let profile = match directory.profile(session.user_id()).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user_id = %session.user_id(), error = %e, "profile lookup failed");
                None
            }
        };

        Ok(Some(Self { session, profile }))
    }

    pub fn id(&self) -> &UserId {
        self.session.user_id()
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().and_then(Profile::role)
    }

    /// Email from the profile row, falling back to the auth record.
    pub fn email(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .or(self.session.user.email.as_deref())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        self.role() == Some(Role::Staff)
    }

    pub fn is_family(&self) -> bool {
        self.role() == Some(Role::Family)
    }
}
