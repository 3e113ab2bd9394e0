// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct messaging for the Haven client.
//!
//! - [`DirectMessageSync`] loads one conversation's history, keeps it live
//!   over a realtime channel, and inserts new messages. Sent messages are
//!   never appended locally; they show up when the backend echoes the insert.
//! - [`ConversationView`] drives the per-view state machine and guarantees a
//!   single open channel across conversation switches.
//! - [`Composer`] owns the draft text.
//! - [`ChatDirectory`] lists the people the current user may message.

pub mod composer;
pub mod directory;
pub mod log;
pub mod sync;
pub mod view;

use haven_config::model::ChatConfig;

pub use composer::Composer;
pub use directory::{ChatDirectory, ChatPartner, RoleFilter};
pub use log::MessageLog;
pub use sync::{DirectMessageSync, SendOutcome, SkipReason, Subscription};
pub use view::{ConversationView, ViewState};

/// Table and channel names used by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub messages_table: String,
    pub channel_name: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            messages_table: config.messages_table.clone(),
            channel_name: config.channel_name.clone(),
        }
    }
}
