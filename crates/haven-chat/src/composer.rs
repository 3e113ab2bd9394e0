// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draft text for the message being written.

use haven_core::{HavenError, UserId};

use crate::sync::{DirectMessageSync, SendOutcome};
use crate::view::ConversationView;

/// Holds the draft until it is sent.
///
/// The draft is cleared only when the insert completes. It does not wait for
/// the realtime echo, and a skipped or failed send leaves it as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn clear(&mut self) {
        self.draft.clear();
    }

    /// Sends the draft through `sync`.
    pub async fn submit(
        &mut self,
        sync: &DirectMessageSync,
        self_id: Option<&UserId>,
        other_id: Option<&UserId>,
    ) -> Result<SendOutcome, HavenError> {
        let outcome = sync.send_message(self_id, other_id, &self.draft).await?;
        self.settle(outcome);
        Ok(outcome)
    }

    /// Sends the draft to the view's active peer.
    pub async fn submit_to(&mut self, view: &ConversationView) -> Result<SendOutcome, HavenError> {
        let outcome = view.send(&self.draft).await?;
        self.settle(outcome);
        Ok(outcome)
    }

    fn settle(&mut self, outcome: SendOutcome) {
        if outcome == SendOutcome::Sent {
            self.draft.clear();
        }
    }
}
