// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime adapter trait for push subscriptions on table inserts.

use async_trait::async_trait;

use crate::error::HavenError;
use crate::traits::adapter::BackendAdapter;
use crate::types::{ChannelHandle, ChannelId, ChannelSpec};

/// Adapter for the backend's push-subscription service.
#[async_trait]
pub trait RealtimeBackend: BackendAdapter {
    /// Opens a channel and starts delivering matching insert events.
    ///
    /// Events stop arriving once the channel is closed; the receiver then
    /// yields `None`.
    async fn open_channel(&self, spec: ChannelSpec) -> Result<ChannelHandle, HavenError>;

    /// Closes a channel. Closing an unknown or already closed channel is a no-op.
    async fn close_channel(&self, id: &ChannelId) -> Result<(), HavenError>;
}
