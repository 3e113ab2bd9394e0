// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Haven care-messaging client.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by the session coordinator, the chat synchronizer, and the backend
//! adapters. Backend adapters implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HavenError;
pub use types::{
    ChatMessage, Conversation, HealthStatus, MessageId, NewChatMessage, Role, Session, UserId,
};

// Re-export all adapter traits at crate root.
pub use traits::{AuthBackend, BackendAdapter, DirectoryStore, MessageStore, RealtimeBackend};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelSpec, ColumnFilter, InsertBinding, Profile};
    use proptest::prelude::*;

    #[test]
    fn haven_error_has_all_variants() {
        let _config = HavenError::Config("test".into());
        let _auth = HavenError::Auth {
            message: "test".into(),
            status: Some(401),
            source: None,
        };
        let _backend = HavenError::Backend {
            message: "test".into(),
            status: None,
            source: Some(Box::new(std::io::Error::other("test"))),
        };
        let _realtime = HavenError::Realtime {
            message: "test".into(),
            source: None,
        };
        let _not_found = HavenError::NotFound {
            entity: "profile".into(),
            key: "u1".into(),
        };
        let _timeout = HavenError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = HavenError::Internal("test".into());
    }

    #[test]
    fn role_parses_case_insensitively() {
        use std::str::FromStr;

        assert_eq!(Role::from_str("staff").unwrap(), Role::Staff);
        assert_eq!(Role::from_str("Family").unwrap(), Role::Family);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!(Role::from_str("janitor").is_err());
    }

    #[test]
    fn profile_role_tolerates_unknown_values() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "a@example.com",
            "role": "volunteer"
        }))
        .unwrap();
        assert_eq!(profile.role(), None);
        assert_eq!(profile.role.as_deref(), Some("volunteer"));
    }

    #[test]
    fn chat_message_uses_message_column_for_body() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "id": 42,
            "sender": "u1",
            "receiver": "u2",
            "message": "hello",
            "created_at": "2026-01-01T00:00:01Z"
        }))
        .unwrap();
        assert_eq!(msg.id, MessageId("42".into()));
        assert_eq!(msg.body, "hello");

        let row = serde_json::to_value(NewChatMessage {
            sender: "u1".into(),
            receiver: "u2".into(),
            body: "hi".into(),
        })
        .unwrap();
        assert_eq!(
            row,
            serde_json::json!({"sender": "u1", "receiver": "u2", "message": "hi"})
        );
    }

    #[test]
    fn conversation_carries_both_directions_only() {
        let conv = Conversation::new("u1".into(), "u2".into());
        assert!(conv.carries(&"u1".into(), &"u2".into()));
        assert!(conv.carries(&"u2".into(), &"u1".into()));
        assert!(!conv.carries(&"u1".into(), &"u3".into()));
        assert_eq!(conv.peer_of(&"u1".into()), Some(&UserId::from("u2")));
        assert_eq!(conv.peer_of(&"u9".into()), None);
    }

    #[test]
    fn session_expiry_margin() {
        let now = chrono::Utc::now();
        let session = Session::new(
            types::AuthUser {
                id: "u1".into(),
                email: None,
            },
            Some(now + chrono::Duration::seconds(30)),
            "tok-access-123",
            "tok-refresh-456",
        );
        assert!(session.expires_within(chrono::Duration::seconds(60), now));
        assert!(!session.expires_within(chrono::Duration::seconds(10), now));
        assert_eq!(session.refresh_token(), "tok-refresh-456");
        // Tokens never show up in debug output.
        let debug = format!("{session:?}");
        assert!(!debug.contains("tok-access-123"));
        assert!(!debug.contains("tok-refresh-456"));
    }

    #[test]
    fn channel_spec_matches_numeric_and_text_columns() {
        let spec = ChannelSpec {
            name: "direct-chat".into(),
            bindings: vec![InsertBinding {
                table: "chat_messages".into(),
                filters: vec![
                    ColumnFilter::equals("receiver", "7"),
                    ColumnFilter::equals("sender", "u2"),
                ],
            }],
        };
        let row = serde_json::json!({"receiver": 7, "sender": "u2"});
        assert!(spec.accepts("chat_messages", &row));
        assert!(!spec.accepts("other_table", &row));
        assert!(!spec.accepts(
            "chat_messages",
            &serde_json::json!({"receiver": 7, "sender": "u3"})
        ));
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_backend_adapter<T: BackendAdapter>() {}
        fn _assert_auth_backend<T: AuthBackend>() {}
        fn _assert_message_store<T: MessageStore>() {}
        fn _assert_directory_store<T: DirectoryStore>() {}
        fn _assert_realtime_backend<T: RealtimeBackend>() {}
    }

    proptest! {
        #[test]
        fn conversation_identity_is_symmetric(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
            let ab = Conversation::new(UserId::new(a.clone()), UserId::new(b.clone()));
            let ba = Conversation::new(UserId::new(b.clone()), UserId::new(a.clone()));
            prop_assert_eq!(&ab, &ba);
            prop_assert!(ab.carries(&UserId::new(a.clone()), &UserId::new(b.clone())));
            prop_assert!(ba.carries(&UserId::new(b), &UserId::new(a)));
        }
    }
}
