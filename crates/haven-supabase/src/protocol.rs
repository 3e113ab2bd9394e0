// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phoenix channel frames as spoken by Supabase Realtime (serializer `1.0.0`).

use haven_core::HavenError;
use haven_core::types::{ChannelSpec, InsertEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_ACCESS_TOKEN: &str = "access_token";

/// Topic heartbeats are sent on.
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Protocol version requested in the socket URL.
pub const PROTOCOL_VSN: &str = "1.0.0";

/// Schema all chat tables live in.
const SCHEMA: &str = "public";

/// One Phoenix message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Channel topic for a channel name.
pub fn topic_for(name: &str) -> String {
    format!("realtime:{name}")
}

impl Frame {
    /// Join request subscribing to INSERTs for every binding of `spec`.
    ///
    /// The server accepts a single `column=eq.value` filter per binding, so only
    /// the first filter is sent; the full filter set is re-checked on receipt.
    pub fn join(spec: &ChannelSpec, reference: &str, access_token: Option<&str>) -> Self {
        let changes: Vec<Value> = spec
            .bindings
            .iter()
            .map(|binding| {
                let mut change = json!({
                    "event": "INSERT",
                    "schema": SCHEMA,
                    "table": binding.table,
                });
                if let Some(filter) = binding.filters.first() {
                    change["filter"] = Value::String(format!("{}=eq.{}", filter.column, filter.value));
                }
                change
            })
            .collect();

        let mut payload = json!({
            "config": {
                "broadcast": {"ack": false, "self": false},
                "presence": {"key": ""},
                "postgres_changes": changes,
                "private": false,
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        Self {
            topic: topic_for(&spec.name),
            event: EVENT_JOIN.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn leave(topic: &str, reference: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    /// Hands a joined channel a fresh JWT so the server keeps it open past
    /// the expiry of the token it joined with.
    pub fn access_token(topic: &str, reference: &str, join_ref: &str, token: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_ACCESS_TOKEN.to_string(),
            payload: json!({ "access_token": token }),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, HavenError> {
        serde_json::from_str(text).map_err(|e| HavenError::Realtime {
            message: format!("malformed realtime frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    pub fn encode(&self) -> Result<String, HavenError> {
        serde_json::to_string(self).map_err(|e| HavenError::Realtime {
            message: format!("failed to encode realtime frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// True if this is the server's reply to the message sent with `reference`.
    pub fn is_reply_to(&self, reference: &str) -> bool {
        self.event == EVENT_REPLY && self.reference.as_deref() == Some(reference)
    }

    /// `status` of a `phx_reply` (`"ok"` or `"error"`).
    pub fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Human-readable reason carried by an error reply.
    pub fn reply_reason(&self) -> String {
        let response = self.payload.get("response");
        response
            .and_then(|r| r.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| response.map(Value::to_string))
            .unwrap_or_else(|| "no reason given".to_string())
    }

    /// Extracts an inserted row, if this frame announces one.
    ///
    /// Understands both the `postgres_changes` event and the older
    /// per-type `INSERT` event.
    pub fn insert_event(&self) -> Option<InsertEvent> {
        match self.event.as_str() {
            EVENT_POSTGRES_CHANGES => {
                let data = self.payload.get("data")?;
                let kind = data
                    .get("type")
                    .or_else(|| data.get("eventType"))
                    .and_then(Value::as_str)?;
                if kind != "INSERT" {
                    return None;
                }
                Some(InsertEvent {
                    table: data.get("table")?.as_str()?.to_string(),
                    record: data.get("record").or_else(|| data.get("new"))?.clone(),
                })
            }
            "INSERT" => Some(InsertEvent {
                table: self.payload.get("table")?.as_str()?.to_string(),
                record: self.payload.get("record")?.clone(),
            }),
            _ => None,
        }
    }
}
