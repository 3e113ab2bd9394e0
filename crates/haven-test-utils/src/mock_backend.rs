// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory backend for deterministic testing.
//!
//! `MockBackend` implements every Haven backend trait against local state:
//! - **auth**: a stored session, password sign-in, call counting, a refresh
//!   gate, and injected refresh failures
//! - **messages**: an in-memory table whose inserts are echoed to every open
//!   channel with a matching binding, like the realtime service does
//! - **realtime**: open/close bookkeeping with an ordered event log
//! - **directory**: profiles, family records, and linked residents

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use haven_core::types::{
    AuthUser, ChannelHandle, ChannelId, ChannelSpec, FamilyRecord, InsertBinding, InsertEvent,
    Profile, ResidentRecord,
};
use haven_core::{
    AuthBackend, BackendAdapter, ChatMessage, Conversation, DirectoryStore, HavenError,
    HealthStatus, MessageId, MessageStore, NewChatMessage, RealtimeBackend, Role, Session, UserId,
};

/// Midnight, 1 January 2026 UTC. Row timestamps count up from here.
const EPOCH_SECS: i64 = 1_767_225_600;

/// Open/close bookkeeping, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened {
        id: ChannelId,
        name: String,
        bindings: Vec<InsertBinding>,
    },
    Closed {
        id: ChannelId,
    },
}

struct OpenChannel {
    spec: ChannelSpec,
    tx: mpsc::Sender<InsertEvent>,
}

/// A backend that keeps everything in memory.
pub struct MockBackend {
    messages_table: String,
    event_buffer: usize,

    session: Mutex<Option<Session>>,
    credentials: Mutex<HashMap<String, (String, AuthUser)>>,
    refresh_calls: AtomicUsize,
    refresh_gate: watch::Sender<bool>,
    refresh_failures: AtomicUsize,
    sign_out_fails: AtomicBool,

    rows: Mutex<Vec<ChatMessage>>,
    next_row: AtomicU64,
    history_calls: AtomicUsize,
    history_gate: watch::Sender<bool>,
    history_fails: AtomicBool,
    insert_calls: AtomicUsize,
    insert_fails: AtomicBool,
    echoes_held: AtomicBool,
    held_echoes: Mutex<Vec<ChatMessage>>,

    channels: Mutex<HashMap<ChannelId, OpenChannel>>,
    channel_log: Mutex<Vec<ChannelEvent>>,
    next_channel: AtomicU64,
    max_open: AtomicUsize,
    open_fails: AtomicBool,

    profiles: Mutex<Vec<Profile>>,
    families: Mutex<Vec<FamilyRecord>>,
    residents: Mutex<Vec<(UserId, ResidentRecord)>>,
}

impl MockBackend {
    /// Create an empty backend using the default `chat_messages` table.
    pub fn new() -> Self {
        Self::with_messages_table("chat_messages")
    }

    pub fn with_messages_table(table: impl Into<String>) -> Self {
        Self {
            messages_table: table.into(),
            event_buffer: 64,
            session: Mutex::new(None),
            credentials: Mutex::new(HashMap::new()),
            refresh_calls: AtomicUsize::new(0),
            refresh_gate: watch::Sender::new(true),
            refresh_failures: AtomicUsize::new(0),
            sign_out_fails: AtomicBool::new(false),
            rows: Mutex::new(Vec::new()),
            next_row: AtomicU64::new(1),
            history_calls: AtomicUsize::new(0),
            history_gate: watch::Sender::new(true),
            history_fails: AtomicBool::new(false),
            insert_calls: AtomicUsize::new(0),
            insert_fails: AtomicBool::new(false),
            echoes_held: AtomicBool::new(false),
            held_echoes: Mutex::new(Vec::new()),
            channels: Mutex::new(HashMap::new()),
            channel_log: Mutex::new(Vec::new()),
            next_channel: AtomicU64::new(1),
            max_open: AtomicUsize::new(0),
            open_fails: AtomicBool::new(false),
            profiles: Mutex::new(Vec::new()),
            families: Mutex::new(Vec::new()),
            residents: Mutex::new(Vec::new()),
        }
    }

    /// A session for `user_id` with fixed tokens and no expiry.
    pub fn session_for(user_id: &str) -> Session {
        Session::new(
            AuthUser {
                id: user_id.into(),
                email: Some(format!("{user_id}@haven.test")),
            },
            None,
            format!("access-{user_id}"),
            format!("refresh-{user_id}"),
        )
    }

    // --- auth controls ---

    /// Replace the session `get_session` reports.
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.lock().await = session;
    }

    /// Register credentials accepted by `sign_in_with_password`.
    pub async fn add_user(&self, email: &str, password: &str, user_id: &str) {
        let user = AuthUser {
            id: user_id.into(),
            email: Some(email.to_string()),
        };
        self.credentials
            .lock()
            .await
            .insert(email.to_string(), (password.to_string(), user));
    }

    /// Number of `get_session` calls that reached the backend.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Make `get_session` wait until [`MockBackend::release_refreshes`].
    pub fn hold_refreshes(&self) {
        self.refresh_gate.send_replace(false);
    }

    pub fn release_refreshes(&self) {
        self.refresh_gate.send_replace(true);
    }

    /// Fail the next `n` refreshes with a 503.
    pub fn fail_next_refreshes(&self, n: usize) {
        self.refresh_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.sign_out_fails.store(fail, Ordering::SeqCst);
    }

    // --- message controls ---

    fn next_message(&self, sender: UserId, receiver: UserId, body: String) -> ChatMessage {
        let n = self.next_row.fetch_add(1, Ordering::SeqCst);
        ChatMessage {
            id: MessageId(n.to_string()),
            sender,
            receiver,
            body,
            created_at: DateTime::from_timestamp(EPOCH_SECS + n as i64, 0).unwrap_or_default(),
        }
    }

    /// Store a row without echoing it, as if it predates every subscription.
    pub async fn seed_message(&self, sender: &str, receiver: &str, body: &str) -> ChatMessage {
        let message = self.next_message(sender.into(), receiver.into(), body.to_string());
        self.rows.lock().await.push(message.clone());
        message
    }

    /// Store a row and echo it, as if another client had sent it.
    pub async fn push_remote(&self, sender: &str, receiver: &str, body: &str) -> ChatMessage {
        let message = self.seed_message(sender, receiver, body).await;
        self.deliver(&message).await;
        message
    }

    /// Every stored row, in insertion order.
    pub async fn stored_rows(&self) -> Vec<ChatMessage> {
        self.rows.lock().await.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Make history queries wait until [`MockBackend::release_history`].
    pub fn hold_history(&self) {
        self.history_gate.send_replace(false);
    }

    pub fn release_history(&self) {
        self.history_gate.send_replace(true);
    }

    pub fn fail_history(&self, fail: bool) {
        self.history_fails.store(fail, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.insert_fails.store(fail, Ordering::SeqCst);
    }

    /// Keep inserted rows from being echoed until [`MockBackend::release_echoes`].
    pub fn hold_echoes(&self) {
        self.echoes_held.store(true, Ordering::SeqCst);
    }

    /// Deliver every held echo, then echo future inserts immediately.
    pub async fn release_echoes(&self) {
        self.echoes_held.store(false, Ordering::SeqCst);
        let held = std::mem::take(&mut *self.held_echoes.lock().await);
        for message in &held {
            self.deliver(message).await;
        }
    }

    async fn deliver(&self, message: &ChatMessage) {
        let record = match serde_json::to_value(message) {
            Ok(record) => record,
            Err(e) => {
                debug!(id = %message.id, error = %e, "mock: message not serializable, not echoed");
                return;
            }
        };
        let targets: Vec<mpsc::Sender<InsertEvent>> = self
            .channels
            .lock()
            .await
            .values()
            .filter(|open| open.spec.accepts(&self.messages_table, &record))
            .map(|open| open.tx.clone())
            .collect();
        debug!(id = %message.id, channels = targets.len(), "mock: echoing insert");
        for tx in targets {
            let event = InsertEvent {
                table: self.messages_table.clone(),
                record: record.clone(),
            };
            if tx.send(event).await.is_err() {
                debug!(id = %message.id, "mock: subscriber gone, event dropped");
            }
        }
    }

    // --- realtime controls ---

    pub fn fail_open(&self, fail: bool) {
        self.open_fails.store(fail, Ordering::SeqCst);
    }

    pub async fn channel_log(&self) -> Vec<ChannelEvent> {
        self.channel_log.lock().await.clone()
    }

    pub async fn open_channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Highest number of simultaneously open channels seen so far.
    pub fn max_open_channels(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    // --- directory controls ---

    pub async fn add_profile(&self, id: &str, role: Option<Role>, email: &str, name: Option<&str>) {
        self.profiles.lock().await.push(Profile {
            id: id.into(),
            email: Some(email.to_string()),
            name: name.map(String::from),
            surname: None,
            role: role.map(|r| r.to_string()),
            created_at: None,
        });
    }

    /// Register a family record and the residents linked to it.
    pub async fn add_family(&self, family: FamilyRecord, residents: Vec<ResidentRecord>) {
        let family_id = family.id.clone();
        self.families.lock().await.push(family);
        self.residents
            .lock()
            .await
            .extend(residents.into_iter().map(|r| (family_id.clone(), r)));
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable(message: &str) -> HavenError {
    HavenError::Backend {
        message: message.to_string(),
        status: Some(503),
        source: None,
    }
}

#[async_trait]
impl BackendAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    async fn health_check(&self) -> Result<HealthStatus, HavenError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>, HavenError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.refresh_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let failing = self
            .refresh_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(HavenError::Auth {
                message: "auth service unavailable".into(),
                status: Some(503),
                source: None,
            });
        }
        Ok(self.session.lock().await.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, HavenError> {
        let user = match self.credentials.lock().await.get(email) {
            Some((expected, user)) if expected == password => user.clone(),
            _ => {
                return Err(HavenError::Auth {
                    message: "Invalid login credentials".into(),
                    status: Some(400),
                    source: None,
                });
            }
        };
        let session = Session::new(
            user.clone(),
            None,
            format!("access-{}", user.id),
            format!("refresh-{}", user.id),
        );
        *self.session.lock().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), HavenError> {
        *self.session.lock().await = None;
        if self.sign_out_fails.load(Ordering::SeqCst) {
            return Err(unavailable("logout failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MockBackend {
    async fn conversation_history(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<ChatMessage>, HavenError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.history_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.history_fails.load(Ordering::SeqCst) {
            return Err(unavailable("history query failed"));
        }
        let mut history: Vec<ChatMessage> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|m| conversation.carries(&m.sender, &m.receiver))
            .cloned()
            .collect();
        history.sort_by_key(|m| m.created_at);
        Ok(history)
    }

    async fn insert_message(&self, message: &NewChatMessage) -> Result<(), HavenError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.insert_fails.load(Ordering::SeqCst) {
            return Err(unavailable("insert rejected"));
        }
        let stored = self.next_message(
            message.sender.clone(),
            message.receiver.clone(),
            message.body.clone(),
        );
        self.rows.lock().await.push(stored.clone());
        if self.echoes_held.load(Ordering::SeqCst) {
            self.held_echoes.lock().await.push(stored);
        } else {
            self.deliver(&stored).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeBackend for MockBackend {
    async fn open_channel(&self, spec: ChannelSpec) -> Result<ChannelHandle, HavenError> {
        if self.open_fails.load(Ordering::SeqCst) {
            debug!(name = %spec.name, "mock: rejecting channel join");
            return Err(HavenError::realtime("channel join rejected"));
        }
        let n = self.next_channel.fetch_add(1, Ordering::SeqCst);
        let id = ChannelId(format!("{}-{n}", spec.name));
        let (tx, rx) = mpsc::channel(self.event_buffer);

        self.channel_log.lock().await.push(ChannelEvent::Opened {
            id: id.clone(),
            name: spec.name.clone(),
            bindings: spec.bindings.clone(),
        });
        let mut channels = self.channels.lock().await;
        channels.insert(id.clone(), OpenChannel { spec, tx });
        self.max_open.fetch_max(channels.len(), Ordering::SeqCst);

        Ok(ChannelHandle { id, events: rx })
    }

    async fn close_channel(&self, id: &ChannelId) -> Result<(), HavenError> {
        if self.channels.lock().await.remove(id).is_some() {
            self.channel_log
                .lock()
                .await
                .push(ChannelEvent::Closed { id: id.clone() });
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MockBackend {
    async fn profile(&self, id: &UserId) -> Result<Profile, HavenError> {
        self.profiles
            .lock()
            .await
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| HavenError::NotFound {
                entity: "profile".into(),
                key: id.to_string(),
            })
    }

    async fn profiles_with_roles(
        &self,
        exclude: &UserId,
        roles: &[Role],
    ) -> Result<Vec<Profile>, HavenError> {
        Ok(self
            .profiles
            .lock()
            .await
            .iter()
            .filter(|p| &p.id != exclude)
            .filter(|p| roles.is_empty() || p.role().is_some_and(|r| roles.contains(&r)))
            .cloned()
            .collect())
    }

    async fn family_by_email(&self, email: &str) -> Result<Option<FamilyRecord>, HavenError> {
        Ok(self
            .families
            .lock()
            .await
            .iter()
            .find(|f| f.email.as_deref() == Some(email))
            .cloned())
    }

    async fn residents_of_family(
        &self,
        family_id: &UserId,
    ) -> Result<Vec<ResidentRecord>, HavenError> {
        Ok(self
            .residents
            .lock()
            .await
            .iter()
            .filter(|(fid, _)| fid == family_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_echoes_to_matching_channel_only() {
        let backend = MockBackend::new();
        let spec = |receiver: &str, sender: &str| ChannelSpec {
            name: "direct-chat".into(),
            bindings: vec![InsertBinding {
                table: "chat_messages".into(),
                filters: vec![
                    haven_core::types::ColumnFilter::equals("receiver", receiver),
                    haven_core::types::ColumnFilter::equals("sender", sender),
                ],
            }],
        };
        let mut ab = backend.open_channel(spec("b", "a")).await.unwrap();
        let mut ac = backend.open_channel(spec("c", "a")).await.unwrap();

        backend
            .insert_message(&NewChatMessage {
                sender: "a".into(),
                receiver: "b".into(),
                body: "hi".into(),
            })
            .await
            .unwrap();

        let event = ab.events.recv().await.unwrap();
        assert_eq!(event.record["message"], "hi");
        assert!(ac.events.try_recv().is_err());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn echo_to_a_gone_subscriber_is_logged() {
        let backend = MockBackend::new();
        let handle = backend
            .open_channel(ChannelSpec {
                name: "direct-chat".into(),
                bindings: vec![InsertBinding {
                    table: "chat_messages".into(),
                    filters: Vec::new(),
                }],
            })
            .await
            .unwrap();
        drop(handle.events);

        backend.push_remote("a", "b", "nobody listening").await;
        assert!(logs_contain("mock: echoing insert"));
        assert!(logs_contain("mock: subscriber gone, event dropped"));
    }

    #[tokio::test]
    async fn closing_unknown_channel_is_noop() {
        let backend = MockBackend::new();
        backend
            .close_channel(&ChannelId("nope".into()))
            .await
            .unwrap();
        assert!(backend.channel_log().await.is_empty());
    }

    #[tokio::test]
    async fn injected_refresh_failures_run_out() {
        let backend = MockBackend::new();
        backend.set_session(Some(MockBackend::session_for("u1"))).await;
        backend.fail_next_refreshes(1);
        assert!(backend.get_session().await.is_err());
        assert!(backend.get_session().await.unwrap().is_some());
        assert_eq!(backend.refresh_calls(), 2);
    }
}
