// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by every command: backend, session coordinator, and the
//! on-disk refresh token.

use std::sync::Arc;
use std::time::Duration;

use haven_chat::{ChatDirectory, ChatSettings, ConversationView};
use haven_config::HavenConfig;
use haven_core::HavenError;
use haven_session::{CurrentUser, ListenerHandle, SessionCoordinator};
use haven_supabase::SupabaseBackend;
use tracing::{debug, warn};

use crate::session_file::SessionFile;

pub struct App {
    pub config: HavenConfig,
    pub backend: Arc<SupabaseBackend>,
    pub coordinator: SessionCoordinator,
    session_file: SessionFile,
    _persist: ListenerHandle,
}

impl App {
    /// Builds the backend, restores a saved session, and keeps the session
    /// file in step with every session change.
    pub fn connect(config: HavenConfig) -> Result<Self, HavenError> {
        let backend = Arc::new(SupabaseBackend::new(&config)?);

        let session_file = SessionFile::new(&config.session.session_file);
        if let Some(stored) = session_file.load() {
            debug!(user_id = %stored.user_id, "restoring saved session");
            backend.restore_session(stored.refresh_token);
        }

        let coordinator = SessionCoordinator::with_cooldown(
            backend.clone(),
            Duration::from_secs(config.session.refresh_cooldown_secs),
        );

        // Refresh tokens rotate, so every new session is written back.
        let file = session_file.clone();
        let persist = coordinator.add_listener(move |session| {
            let result = match session {
                Some(session) => file.save(session),
                None => file.remove(),
            };
            if let Err(e) = result {
                warn!(error = %e, "could not update session file");
            }
        });

        Ok(Self {
            config,
            backend,
            coordinator,
            session_file,
            _persist: persist,
        })
    }

    pub fn session_file(&self) -> &SessionFile {
        &self.session_file
    }

    /// The signed-in user, or an auth error telling the user to log in.
    pub async fn require_user(&self) -> Result<CurrentUser, HavenError> {
        CurrentUser::resolve(&self.coordinator, self.backend.as_ref())
            .await?
            .ok_or_else(|| HavenError::auth("not signed in; run `haven login --email <email>`"))
    }

    pub fn directory(&self) -> ChatDirectory {
        ChatDirectory::new(self.backend.clone())
    }

    pub fn conversation_view(&self, user: &CurrentUser) -> ConversationView {
        ConversationView::new(
            self.backend.clone(),
            self.backend.clone(),
            ChatSettings::from(&self.config.chat),
            self.config.chat.merge_policy,
            user.id().clone(),
        )
    }

    /// Closes anything still holding a socket.
    pub async fn shutdown(&self) {
        self.backend.shutdown().await;
    }
}
