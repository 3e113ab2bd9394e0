// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps one conversation's message list in step with the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use haven_core::types::{ChannelId, ChannelSpec, ColumnFilter, InsertBinding, InsertEvent};
use haven_core::{
    ChatMessage, Conversation, HavenError, MessageStore, NewChatMessage, RealtimeBackend, UserId,
};

use crate::ChatSettings;
use crate::log::MessageLog;

/// Why a send was declined without contacting the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyBody,
    MissingSender,
    MissingReceiver,
}

/// Result of [`DirectMessageSync::send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The insert completed. The message appears once the backend echoes it.
    Sent,
    Skipped(SkipReason),
}

/// Message list and backend plumbing for a single conversation.
///
/// A new synchronizer is created for every conversation; switching
/// conversations replaces the list instead of mutating it.
pub struct DirectMessageSync {
    store: Arc<dyn MessageStore>,
    realtime: Arc<dyn RealtimeBackend>,
    settings: ChatSettings,
    log: Arc<watch::Sender<MessageLog>>,
}

impl DirectMessageSync {
    pub fn new(
        store: Arc<dyn MessageStore>,
        realtime: Arc<dyn RealtimeBackend>,
        settings: ChatSettings,
    ) -> Self {
        let (tx, _rx) = watch::channel(MessageLog::default());
        Self {
            store,
            realtime,
            settings,
            log: Arc::new(tx),
        }
    }

    /// Snapshot of the current list.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.borrow().items().to_vec()
    }

    /// Receiver that is notified whenever the list changes.
    pub fn watch(&self) -> watch::Receiver<MessageLog> {
        self.log.subscribe()
    }

    /// Replaces the list with every message exchanged between the two users,
    /// oldest first.
    ///
    /// On failure the previous list is kept and the error is returned.
    pub async fn load_history(&self, self_id: &UserId, other_id: &UserId) -> Result<(), HavenError> {
        let conversation = Conversation::new(self_id.clone(), other_id.clone());
        let load = PendingLoad::begin(&self.log);

        match self.store.conversation_history(&conversation).await {
            Ok(history) => {
                debug!(%conversation, count = history.len(), "history loaded");
                load.finish(history);
                Ok(())
            }
            Err(e) => {
                error!(%conversation, error = %e, "failed to load message history");
                drop(load);
                Err(e)
            }
        }
    }

    /// Opens the realtime channel for this pair.
    ///
    /// The channel carries inserts in either direction; every event is
    /// appended at the end of the list. The returned [`Subscription`] closes
    /// the channel.
    pub async fn subscribe(
        &self,
        self_id: &UserId,
        other_id: &UserId,
    ) -> Result<Subscription, HavenError> {
        let conversation = Conversation::new(self_id.clone(), other_id.clone());
        let spec = self.channel_spec(self_id, other_id);

        let handle = self.realtime.open_channel(spec).await.inspect_err(|e| {
            error!(%conversation, error = %e, "failed to open chat channel");
        })?;
        debug!(channel = %handle.id, %conversation, "chat channel open");

        let forwarder = tokio::spawn(forward_events(
            handle.events,
            conversation.clone(),
            Arc::clone(&self.log),
        ));

        Ok(Subscription {
            channel: handle.id,
            conversation,
            realtime: Arc::clone(&self.realtime),
            forwarder,
            closed: AtomicBool::new(false),
        })
    }

    /// Inserts one message row.
    ///
    /// Declined without a backend call when the body is blank or either
    /// participant is missing. The list is not touched either way.
    pub async fn send_message(
        &self,
        self_id: Option<&UserId>,
        other_id: Option<&UserId>,
        body: &str,
    ) -> Result<SendOutcome, HavenError> {
        let skip = if body.trim().is_empty() {
            Some(SkipReason::EmptyBody)
        } else if self_id.is_none_or(UserId::is_blank) {
            Some(SkipReason::MissingSender)
        } else if other_id.is_none_or(UserId::is_blank) {
            Some(SkipReason::MissingReceiver)
        } else {
            None
        };
        let (Some(sender), Some(receiver), None) = (self_id, other_id, skip) else {
            let reason = skip.unwrap_or(SkipReason::EmptyBody);
            debug!(?reason, "send skipped");
            return Ok(SendOutcome::Skipped(reason));
        };

        let row = NewChatMessage {
            sender: sender.clone(),
            receiver: receiver.clone(),
            body: body.to_string(),
        };
        match self.store.insert_message(&row).await {
            Ok(()) => {
                debug!(%sender, %receiver, "message inserted");
                Ok(SendOutcome::Sent)
            }
            Err(e) => {
                error!(%sender, %receiver, error = %e, "failed to send message");
                Err(e)
            }
        }
    }

    /// Two insert bindings, one per direction.
    fn channel_spec(&self, self_id: &UserId, other_id: &UserId) -> ChannelSpec {
        let binding = |receiver: &UserId, sender: &UserId| InsertBinding {
            table: self.settings.messages_table.clone(),
            filters: vec![
                ColumnFilter::equals("receiver", receiver.as_str()),
                ColumnFilter::equals("sender", sender.as_str()),
            ],
        };
        ChannelSpec {
            name: self.settings.channel_name.clone(),
            bindings: vec![binding(self_id, other_id), binding(other_id, self_id)],
        }
    }
}

/// One history load in progress. Dropping it without [`PendingLoad::finish`]
/// aborts the load, which also covers a cancelled `load_history` future.
struct PendingLoad<'a> {
    log: &'a watch::Sender<MessageLog>,
    finished: bool,
}

impl<'a> PendingLoad<'a> {
    fn begin(log: &'a watch::Sender<MessageLog>) -> Self {
        log.send_modify(MessageLog::begin_load);
        Self {
            log,
            finished: false,
        }
    }

    fn finish(mut self, history: Vec<ChatMessage>) {
        self.finished = true;
        self.log.send_modify(|log| log.finish_load(history));
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.log.send_modify(MessageLog::abort_load);
        }
    }
}

async fn forward_events(
    mut events: mpsc::Receiver<InsertEvent>,
    conversation: Conversation,
    log: Arc<watch::Sender<MessageLog>>,
) {
    while let Some(event) = events.recv().await {
        let message: ChatMessage = match serde_json::from_value(event.record) {
            Ok(message) => message,
            Err(e) => {
                warn!(table = %event.table, error = %e, "dropping malformed chat event");
                continue;
            }
        };
        if !conversation.carries(&message.sender, &message.receiver) {
            debug!(%conversation, id = %message.id, "ignoring event for another conversation");
            continue;
        }
        log.send_if_modified(|log| log.append(message));
    }
    debug!(%conversation, "chat event stream ended");
}

/// An open realtime channel for one conversation.
///
/// [`Subscription::teardown`] closes it exactly once. Dropping an open
/// subscription stops event delivery immediately and closes the channel in
/// the background, unawaited: a channel opened right after the drop may be
/// open before the old one is closed. Call `teardown` when the close must
/// happen first.
#[must_use = "dropping the subscription closes the channel"]
pub struct Subscription {
    channel: ChannelId,
    conversation: Conversation,
    realtime: Arc<dyn RealtimeBackend>,
    forwarder: JoinHandle<()>,
    closed: AtomicBool,
}

impl Subscription {
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops event delivery and closes the channel. Later calls do nothing.
    pub async fn teardown(&self) -> Result<(), HavenError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.forwarder.abort();
        debug!(channel = %self.channel, conversation = %self.conversation, "closing chat channel");
        self.realtime
            .close_channel(&self.channel)
            .await
            .inspect_err(|e| warn!(channel = %self.channel, error = %e, "failed to close chat channel"))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.forwarder.abort();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(channel = %self.channel, "subscription dropped outside a runtime, channel left open");
            return;
        };
        let realtime = Arc::clone(&self.realtime);
        let channel = self.channel.clone();
        runtime.spawn(async move {
            if let Err(e) = realtime.close_channel(&channel).await {
                warn!(%channel, error = %e, "failed to close dropped chat channel");
            }
        });
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("conversation", &self.conversation)
            .field("closed", &self.is_closed())
            .finish()
    }
}
