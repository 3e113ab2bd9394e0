// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auth adapter trait for the backend's session service.

use async_trait::async_trait;

use crate::error::HavenError;
use crate::traits::adapter::BackendAdapter;
use crate::types::Session;

/// Adapter for the backend auth service.
///
/// The adapter owns the stored tokens; callers only observe the resulting
/// [`Session`] values.
#[async_trait]
pub trait AuthBackend: BackendAdapter {
    /// Returns the current session, refreshing the access token first if it is
    /// about to expire. `Ok(None)` means nobody is signed in.
    async fn get_session(&self) -> Result<Option<Session>, HavenError>;

    /// Signs in with email and password, replacing any stored session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, HavenError>;

    /// Revokes the stored session. The local copy is dropped even if the call fails.
    async fn sign_out(&self) -> Result<(), HavenError>;
}
