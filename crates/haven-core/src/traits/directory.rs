// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory store trait for profiles, families, and residents.

use async_trait::async_trait;

use crate::error::HavenError;
use crate::traits::adapter::BackendAdapter;
use crate::types::{FamilyRecord, Profile, ResidentRecord, Role, UserId};

/// Adapter for the lookups chat needs to decide who may talk to whom.
#[async_trait]
pub trait DirectoryStore: BackendAdapter {
    /// Fetches a single profile. Returns [`HavenError::NotFound`] if absent.
    async fn profile(&self, id: &UserId) -> Result<Profile, HavenError>;

    /// Lists profiles holding any of `roles`, excluding `exclude`.
    async fn profiles_with_roles(
        &self,
        exclude: &UserId,
        roles: &[Role],
    ) -> Result<Vec<Profile>, HavenError>;

    /// Finds the family record registered under `email`, if any.
    async fn family_by_email(&self, email: &str) -> Result<Option<FamilyRecord>, HavenError>;

    /// Residents linked to a family record.
    async fn residents_of_family(
        &self,
        family_id: &UserId,
    ) -> Result<Vec<ResidentRecord>, HavenError>;
}
