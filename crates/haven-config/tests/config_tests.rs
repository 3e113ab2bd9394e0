// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Haven configuration system.

use figment::Jail;
use haven_config::diagnostic::ConfigError;
use haven_config::{
    MergePolicy, load_and_validate_path, load_and_validate_str, load_config_from_path,
    load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_haven_config() {
    let toml = r#"
[backend]
url = "https://demo.supabase.co"
anon_key = "anon-123"
request_timeout_secs = 15

[session]
refresh_cooldown_secs = 5
expiry_margin_secs = 30
session_file = "/tmp/haven/session.json"

[chat]
messages_table = "dm"
channel_name = "dm-channel"
merge_policy = "accept_race"
event_buffer = 32

[realtime]
heartbeat_secs = 10

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.backend.url.as_deref(), Some("https://demo.supabase.co"));
    assert_eq!(config.backend.anon_key.as_deref(), Some("anon-123"));
    assert_eq!(config.backend.request_timeout_secs, 15);
    assert_eq!(config.session.refresh_cooldown_secs, 5);
    assert_eq!(config.session.expiry_margin_secs, 30);
    assert_eq!(config.session.session_file, "/tmp/haven/session.json");
    assert_eq!(config.chat.messages_table, "dm");
    assert_eq!(config.chat.channel_name, "dm-channel");
    assert_eq!(config.chat.merge_policy, MergePolicy::AcceptRace);
    assert_eq!(config.chat.event_buffer, 32);
    assert_eq!(config.realtime.heartbeat_secs, 10);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn empty_config_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.backend.url, None);
    assert_eq!(config.backend.request_timeout_secs, 30);
    assert_eq!(config.session.refresh_cooldown_secs, 10);
    assert_eq!(config.session.expiry_margin_secs, 60);
    assert_eq!(config.chat.messages_table, "chat_messages");
    assert_eq!(config.chat.channel_name, "direct-chat");
    assert_eq!(config.chat.merge_policy, MergePolicy::SubscribeFirst);
    assert_eq!(config.chat.event_buffer, 256);
    assert_eq!(config.realtime.heartbeat_secs, 25);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[backend]
anon_kye = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "anon_kye");
            assert_eq!(suggestion.as_deref(), Some("anon_key"));
            assert!(valid_keys.contains("request_timeout_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[sesion]
refresh_cooldown_secs = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown section must be rejected");
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "sesion"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[session]
refresh_cooldown_secs = "ten"
"#;

    let errors = load_and_validate_str(toml).expect_err("string is not a u64");
    assert!(matches!(&errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn unknown_merge_policy_is_reported() {
    let toml = r#"
[chat]
merge_policy = "yolo"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown variant");
    assert_eq!(errors.len(), 1);
}

#[test]
fn validation_errors_are_collected_together() {
    let toml = r#"
[backend]
url = "ftp://demo"

[session]
refresh_cooldown_secs = 0

[logging]
level = "loud"
"#;

    let errors = load_and_validate_str(toml).expect_err("three invalid values");
    assert_eq!(errors.len(), 3);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn env_vars_override_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[backend]
url = "https://file.supabase.co"
anon_key = "from-file"
"#,
        )?;
        jail.set_env("HAVEN_BACKEND_ANON_KEY", "from-env");
        jail.set_env("HAVEN_SESSION_REFRESH_COOLDOWN_SECS", "3");
        jail.set_env("HAVEN_CHAT_MERGE_POLICY", "accept_race");

        let config = load_config_from_path(std::path::Path::new("custom.toml"))
            .expect("file plus env should load");
        assert_eq!(config.backend.url.as_deref(), Some("https://file.supabase.co"));
        assert_eq!(config.backend.anon_key.as_deref(), Some("from-env"));
        assert_eq!(config.session.refresh_cooldown_secs, 3);
        assert_eq!(config.chat.merge_policy, MergePolicy::AcceptRace);
        Ok(())
    });
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let errors = load_and_validate_path(std::path::Path::new("/nonexistent/haven.toml"))
        .expect_err("missing file");
    assert!(matches!(&errors[0], ConfigError::MissingFile { .. }));
}
