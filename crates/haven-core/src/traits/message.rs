// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store trait for the chat messages table.

use async_trait::async_trait;

use crate::error::HavenError;
use crate::traits::adapter::BackendAdapter;
use crate::types::{ChatMessage, Conversation, NewChatMessage};

/// Adapter for reading and writing direct messages.
#[async_trait]
pub trait MessageStore: BackendAdapter {
    /// All messages exchanged in either direction within `conversation`,
    /// ordered by creation time ascending.
    async fn conversation_history(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<ChatMessage>, HavenError>;

    /// Inserts one message row. Id and timestamp are assigned by the backend.
    async fn insert_message(&self, message: &NewChatMessage) -> Result<(), HavenError>;
}
