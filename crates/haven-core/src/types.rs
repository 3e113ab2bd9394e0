// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Haven client.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use tokio::sync::mpsc;

/// Accepts both JSON strings and integers for row identifiers.
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

/// Identifier of an authenticated user, profile, or resident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An identifier made only of whitespace counts as absent.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        flexible_id(deserializer).map(UserId)
    }
}

/// Server-assigned identifier of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        flexible_id(deserializer).map(MessageId)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

// --- Auth ---

/// The user an auth session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Bearer and refresh tokens issued by the auth service.
///
/// Opaque to the client: they are only ever handed back to the backend.
#[derive(Debug)]
pub struct SessionTokens {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

/// The currently authenticated identity.
///
/// A session is replaced wholesale on every refresh and never mutated in place.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthUser,
    /// When the access token stops being accepted. `None` if the service did not say.
    pub expires_at: Option<DateTime<Utc>>,
    pub tokens: Arc<SessionTokens>,
}

impl Session {
    pub fn new(
        user: AuthUser,
        expires_at: Option<DateTime<Utc>>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            user,
            expires_at,
            tokens: Arc::new(SessionTokens {
                access_token: SecretString::from(access_token.into()),
                refresh_token: SecretString::from(refresh_token.into()),
            }),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    pub fn access_token(&self) -> &str {
        self.tokens.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> &str {
        self.tokens.refresh_token.expose_secret()
    }

    /// True if the access token expires before `now + margin`.
    pub fn expires_within(&self, margin: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => at - now <= margin,
            None => false,
        }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user
            && self.expires_at == other.expires_at
            && self.access_token() == other.access_token()
    }
}

// --- Directory ---

/// Roles a profile can hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Family,
    Resident,
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    /// Raw role column; see [`Profile::role`].
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Parsed role, `None` when the column is empty or holds an unknown value.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

/// A row of the `family` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A row of the `residents` table, reduced to what chat needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentRecord {
    pub id: UserId,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default, rename = "carelevel")]
    pub care_level: Option<String>,
    #[serde(default, rename = "img")]
    pub avatar: Option<String>,
}

// --- Chat ---

/// An unordered pair of participants.
///
/// `Conversation::new(a, b) == Conversation::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conversation {
    low: UserId,
    high: UserId,
}

impl Conversation {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Both participants, in a stable order independent of construction order.
    pub fn participants(&self) -> (&UserId, &UserId) {
        (&self.low, &self.high)
    }

    pub fn includes(&self, id: &UserId) -> bool {
        &self.low == id || &self.high == id
    }

    /// The other participant, from `id`'s point of view.
    pub fn peer_of(&self, id: &UserId) -> Option<&UserId> {
        if &self.low == id {
            Some(&self.high)
        } else if &self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }

    /// True if a message from `sender` to `receiver` belongs to this conversation.
    pub fn carries(&self, sender: &UserId, receiver: &UserId) -> bool {
        (sender == &self.low && receiver == &self.high)
            || (sender == &self.high && receiver == &self.low)
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

/// A row of the chat messages table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    #[serde(rename = "message")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn conversation(&self) -> Conversation {
        Conversation::new(self.sender.clone(), self.receiver.clone())
    }
}

/// The row written when a message is sent. Id and timestamp are assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub sender: UserId,
    pub receiver: UserId,
    #[serde(rename = "message")]
    pub body: String,
}

// --- Realtime ---

/// Identifier of an open realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `column = value` predicate on a newly inserted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

impl ColumnFilter {
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Checks the predicate against a JSON row. Numbers compare by their text form.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        match record.get(&self.column) {
            Some(serde_json::Value::String(s)) => s == &self.value,
            Some(serde_json::Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }
}

/// Subscription to INSERT events on one table, restricted by all of `filters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertBinding {
    pub table: String,
    pub filters: Vec<ColumnFilter>,
}

impl InsertBinding {
    pub fn matches(&self, table: &str, record: &serde_json::Value) -> bool {
        self.table == table && self.filters.iter().all(|f| f.matches(record))
    }
}

/// What to open: a named channel carrying one or more insert bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub bindings: Vec<InsertBinding>,
}

impl ChannelSpec {
    /// True if any binding accepts the row.
    pub fn accepts(&self, table: &str, record: &serde_json::Value) -> bool {
        self.bindings.iter().any(|b| b.matches(table, record))
    }
}

/// A row inserted into a subscribed table.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertEvent {
    pub table: String,
    pub record: serde_json::Value,
}

/// An open channel: its id (needed to close it) and the stream of events it delivers.
#[derive(Debug)]
pub struct ChannelHandle {
    pub id: ChannelId,
    pub events: mpsc::Receiver<InsertEvent>,
}
