// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all backend adapters must implement.

use async_trait::async_trait;

use crate::error::HavenError;
use crate::types::HealthStatus;

/// The base trait for all backend adapters.
///
/// Every adapter (auth, storage, realtime) provides identity and a health check.
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, HavenError>;
}
