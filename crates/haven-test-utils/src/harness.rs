// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end chat and session tests.
//!
//! `ChatHarness` wires one [`MockBackend`] to session coordinators,
//! conversation views, synchronizers, and directories built from a
//! [`HavenConfig`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use haven_chat::{ChatDirectory, ChatSettings, ConversationView, DirectMessageSync, MessageLog};
use haven_config::{HavenConfig, MergePolicy};
use haven_core::types::{FamilyRecord, ResidentRecord};
use haven_core::{ChatMessage, HavenError, Role, UserId};
use haven_session::SessionCoordinator;

use crate::mock_backend::MockBackend;

/// How long [`wait_for_len`] waits before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct ChatHarnessBuilder {
    config: HavenConfig,
    profiles: Vec<(String, Option<Role>, Option<String>)>,
    families: Vec<(FamilyRecord, Vec<ResidentRecord>)>,
    signed_in: Option<String>,
}

impl ChatHarnessBuilder {
    fn new() -> Self {
        Self {
            config: HavenConfig::default(),
            profiles: Vec::new(),
            families: Vec::new(),
            signed_in: None,
        }
    }

    /// Start from a specific configuration.
    pub fn with_config(mut self, config: HavenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.config.chat.merge_policy = policy;
        self
    }

    /// Add a profile row. Its email is `<id>@haven.test`.
    pub fn with_profile(mut self, id: &str, role: Role) -> Self {
        self.profiles.push((id.to_string(), Some(role), None));
        self
    }

    /// Add a profile row with a display name.
    pub fn with_named_profile(mut self, id: &str, role: Option<Role>, name: &str) -> Self {
        self.profiles
            .push((id.to_string(), role, Some(name.to_string())));
        self
    }

    /// Link residents to the family member whose profile email matches.
    pub fn with_family(mut self, family_id: &str, member_id: &str, residents: &[(&str, &str)]) -> Self {
        let family = FamilyRecord {
            id: family_id.into(),
            name: None,
            surname: None,
            email: Some(format!("{member_id}@haven.test")),
        };
        let residents = residents
            .iter()
            .map(|(id, fullname)| ResidentRecord {
                id: (*id).into(),
                fullname: Some(fullname.to_string()),
                care_level: None,
                avatar: None,
            })
            .collect();
        self.families.push((family, residents));
        self
    }

    /// Make `get_session` report `user_id` as signed in.
    pub fn signed_in_as(mut self, user_id: &str) -> Self {
        self.signed_in = Some(user_id.to_string());
        self
    }

    /// Build the harness, seeding the mock backend.
    pub async fn build(self) -> ChatHarness {
        let backend = Arc::new(MockBackend::with_messages_table(
            self.config.chat.messages_table.clone(),
        ));
        for (id, role, name) in &self.profiles {
            backend
                .add_profile(id, *role, &format!("{id}@haven.test"), name.as_deref())
                .await;
        }
        for (family, residents) in self.families {
            backend.add_family(family, residents).await;
        }
        if let Some(user_id) = &self.signed_in {
            backend
                .set_session(Some(MockBackend::session_for(user_id)))
                .await;
        }
        ChatHarness {
            backend,
            config: self.config,
        }
    }
}

/// A complete client stack over a [`MockBackend`].
pub struct ChatHarness {
    pub backend: Arc<MockBackend>,
    pub config: HavenConfig,
}

impl ChatHarness {
    pub fn builder() -> ChatHarnessBuilder {
        ChatHarnessBuilder::new()
    }

    pub fn settings(&self) -> ChatSettings {
        ChatSettings::from(&self.config.chat)
    }

    /// A coordinator using the configured cooldown.
    pub fn coordinator(&self) -> SessionCoordinator {
        SessionCoordinator::with_cooldown(
            self.backend.clone(),
            Duration::from_secs(self.config.session.refresh_cooldown_secs),
        )
    }

    /// A fresh synchronizer with an empty list.
    pub fn sync(&self) -> DirectMessageSync {
        DirectMessageSync::new(self.backend.clone(), self.backend.clone(), self.settings())
    }

    /// A view for `self_id` with the configured merge policy.
    pub fn view(&self, self_id: &str) -> ConversationView {
        ConversationView::new(
            self.backend.clone(),
            self.backend.clone(),
            self.settings(),
            self.config.chat.merge_policy,
            UserId::from(self_id),
        )
    }

    pub fn directory(&self) -> ChatDirectory {
        ChatDirectory::new(self.backend.clone())
    }
}

/// Wait until the watched list holds at least `len` messages.
pub async fn wait_for_len(
    rx: &mut watch::Receiver<MessageLog>,
    len: usize,
) -> Result<Vec<ChatMessage>, HavenError> {
    let waited = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|log| log.len() >= len)).await;
    match waited {
        Ok(Ok(log)) => Ok(log.items().to_vec()),
        Ok(Err(_)) => Err(HavenError::Internal("message list dropped".into())),
        Err(_) => Err(HavenError::Timeout {
            duration: WAIT_TIMEOUT,
        }),
    }
}
