// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed `haven.toml` sections.
//!
//! Every section denies unknown fields, so a misspelled key fails the load
//! with a suggestion instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Haven configuration.
///
/// Every section may be omitted; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HavenConfig {
    /// Backend service endpoint and credentials.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Session coordinator settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Direct-message settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Realtime socket settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,

    /// Public anon key sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: Option<String>,

    /// Per-request timeout for auth and storage calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Session coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// How long a refreshed session is served from cache.
    #[serde(default = "default_refresh_cooldown_secs")]
    pub refresh_cooldown_secs: u64,

    /// Refresh the access token when it expires within this many seconds.
    #[serde(default = "default_expiry_margin_secs")]
    pub expiry_margin_secs: u64,

    /// Where the CLI keeps the refresh token between runs.
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_cooldown_secs: default_refresh_cooldown_secs(),
            expiry_margin_secs: default_expiry_margin_secs(),
            session_file: default_session_file(),
        }
    }
}

fn default_refresh_cooldown_secs() -> u64 {
    10
}

fn default_expiry_margin_secs() -> u64 {
    60
}

fn default_session_file() -> String {
    dirs::data_dir()
        .map(|p| p.join("haven").join("session.json"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "haven-session.json".to_string())
}

/// Order in which a conversation view loads history and opens its channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Open the channel first, then load history and merge by message id.
    #[default]
    SubscribeFirst,
    /// Load history, then open the channel. A message inserted in between is missed.
    AcceptRace,
}

/// Direct-message configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Table holding chat rows.
    #[serde(default = "default_messages_table")]
    pub messages_table: String,

    /// Realtime channel name used for a conversation.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// History/subscription ordering.
    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Capacity of the per-channel event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            messages_table: default_messages_table(),
            channel_name: default_channel_name(),
            merge_policy: MergePolicy::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_messages_table() -> String {
    "chat_messages".to_string()
}

fn default_channel_name() -> String {
    "direct-chat".to_string()
}

fn default_event_buffer() -> usize {
    256
}

/// Realtime socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Interval between Phoenix heartbeats.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    25
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
