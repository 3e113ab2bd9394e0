// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-view conversation state machine.
//!
//! `NoConversationSelected -> HistoryLoading -> Live -> [switch] -> Live`,
//! and `Live -> Unsubscribed` on close. At most one channel is open per view:
//! switching closes the previous channel before the next one is opened.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use haven_config::MergePolicy;
use haven_core::{ChatMessage, HavenError, MessageStore, RealtimeBackend, UserId};

use crate::ChatSettings;
use crate::log::MessageLog;
use crate::sync::{DirectMessageSync, SendOutcome, SkipReason, Subscription};

/// States of a conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    NoConversationSelected,
    HistoryLoading,
    /// Channel open and history applied (or its failure reported).
    Live,
    /// The view was closed; its channel is gone.
    Unsubscribed,
}

impl std::fmt::Display for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewState::NoConversationSelected => write!(f, "no-conversation"),
            ViewState::HistoryLoading => write!(f, "history-loading"),
            ViewState::Live => write!(f, "live"),
            ViewState::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

struct ActiveConversation {
    peer: UserId,
    sync: DirectMessageSync,
    subscription: Subscription,
}

/// One user's view onto one conversation at a time.
pub struct ConversationView {
    store: Arc<dyn MessageStore>,
    realtime: Arc<dyn RealtimeBackend>,
    settings: ChatSettings,
    policy: MergePolicy,
    self_id: UserId,
    state: ViewState,
    active: Option<ActiveConversation>,
}

impl ConversationView {
    pub fn new(
        store: Arc<dyn MessageStore>,
        realtime: Arc<dyn RealtimeBackend>,
        settings: ChatSettings,
        policy: MergePolicy,
        self_id: UserId,
    ) -> Self {
        Self {
            store,
            realtime,
            settings,
            policy,
            self_id,
            state: ViewState::NoConversationSelected,
            active: None,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn self_id(&self) -> &UserId {
        &self.self_id
    }

    pub fn peer(&self) -> Option<&UserId> {
        self.active.as_ref().map(|a| &a.peer)
    }

    /// Messages of the active conversation, empty when none is selected.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.active
            .as_ref()
            .map(|a| a.sync.messages())
            .unwrap_or_default()
    }

    pub fn watch(&self) -> Option<watch::Receiver<MessageLog>> {
        self.active.as_ref().map(|a| a.sync.watch())
    }

    pub fn sync(&self) -> Option<&DirectMessageSync> {
        self.active.as_ref().map(|a| &a.sync)
    }

    /// Selects the conversation with `peer`, closing the previous one first.
    ///
    /// A channel failure leaves no conversation selected and is returned. A
    /// history failure leaves the view live on an empty list; the error is
    /// still returned so the caller can report it.
    pub async fn open(&mut self, peer: UserId) -> Result<(), HavenError> {
        self.close_active().await;
        self.state = ViewState::HistoryLoading;

        let sync = DirectMessageSync::new(
            Arc::clone(&self.store),
            Arc::clone(&self.realtime),
            self.settings.clone(),
        );
        debug!(self_id = %self.self_id, %peer, policy = ?self.policy, "opening conversation");

        let (subscription, history) = match self.policy {
            MergePolicy::SubscribeFirst => {
                let subscription = self.subscribe_or_reset(&sync, &peer).await?;
                let history = sync.load_history(&self.self_id, &peer).await;
                (subscription, history)
            }
            MergePolicy::AcceptRace => {
                let history = sync.load_history(&self.self_id, &peer).await;
                let subscription = self.subscribe_or_reset(&sync, &peer).await?;
                (subscription, history)
            }
        };

        self.active = Some(ActiveConversation {
            peer,
            sync,
            subscription,
        });
        self.state = ViewState::Live;
        history
    }

    async fn subscribe_or_reset(
        &mut self,
        sync: &DirectMessageSync,
        peer: &UserId,
    ) -> Result<Subscription, HavenError> {
        sync.subscribe(&self.self_id, peer).await.inspect_err(|_| {
            self.state = ViewState::NoConversationSelected;
        })
    }

    /// Sends `body` to the active peer. Skipped when no conversation is open.
    pub async fn send(&self, body: &str) -> Result<SendOutcome, HavenError> {
        match &self.active {
            Some(active) => {
                active
                    .sync
                    .send_message(Some(&self.self_id), Some(&active.peer), body)
                    .await
            }
            None => {
                let reason = if body.trim().is_empty() {
                    SkipReason::EmptyBody
                } else {
                    SkipReason::MissingReceiver
                };
                Ok(SendOutcome::Skipped(reason))
            }
        }
    }

    /// Closes the active channel. Closing an idle view is a no-op.
    pub async fn close(&mut self) {
        if self.active.is_some() {
            self.close_active().await;
            self.state = ViewState::Unsubscribed;
        }
    }

    async fn close_active(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.subscription.teardown().await {
                warn!(peer = %active.peer, error = %e, "closing previous conversation failed");
            }
        }
    }
}
