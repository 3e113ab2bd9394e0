// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks on values that deserialize fine but cannot work at runtime.

use crate::diagnostic::ConfigError;
use crate::model::HavenConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates every section and returns all problems found, not just the first.
pub fn validate_config(config: &HavenConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if let Some(url) = config.backend.url.as_deref().map(str::trim) {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ConfigError::validation(
                "backend.url",
                format!("`{url}` must start with http:// or https://"),
            ));
        }
    }

    let durations = [
        ("backend.request_timeout_secs", config.backend.request_timeout_secs),
        ("session.refresh_cooldown_secs", config.session.refresh_cooldown_secs),
        ("realtime.heartbeat_secs", config.realtime.heartbeat_secs),
    ];
    for (key, secs) in durations {
        if secs == 0 {
            errors.push(ConfigError::validation(key, "must be at least 1 second"));
        }
    }

    if config.chat.event_buffer == 0 {
        errors.push(ConfigError::validation("chat.event_buffer", "must hold at least 1 event"));
    }

    let names = [
        ("session.session_file", &config.session.session_file),
        ("chat.messages_table", &config.chat.messages_table),
        ("chat.channel_name", &config.chat.channel_name),
    ];
    for (key, value) in names {
        if value.trim().is_empty() {
            errors.push(ConfigError::validation(key, "must not be empty"));
        }
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(
            "logging.level",
            format!("`{}` is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
