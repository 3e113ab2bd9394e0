// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supabase backend adapter for the Haven client.
//!
//! [`SupabaseBackend`] implements every Haven backend trait against one
//! Supabase project: GoTrue for auth, PostgREST for the message and
//! directory tables, and Phoenix channels for realtime inserts.

pub mod client;
pub mod protocol;
pub mod query;
pub mod realtime;
pub mod types;

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use haven_config::HavenConfig;
use haven_core::traits::{
    AuthBackend, BackendAdapter, DirectoryStore, MessageStore, RealtimeBackend,
};
use haven_core::types::{
    ChannelHandle, ChannelId, ChannelSpec, FamilyRecord, HealthStatus, Profile, ResidentRecord,
};
use haven_core::{ChatMessage, Conversation, HavenError, NewChatMessage, Role, Session, UserId};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::client::SupabaseClient;
use crate::realtime::RealtimeClient;

const PROFILES_TABLE: &str = "profiles";
const FAMILY_TABLE: &str = "family";
const RESIDENTS_TABLE: &str = "residents";

/// Where the auth state stands between calls.
enum AuthState {
    SignedOut,
    /// A refresh token from an earlier run, not yet exchanged.
    Restorable(SecretString),
    Active(Session),
}

/// Supabase project adapter implementing all Haven backend traits.
///
/// URL and anon key resolution order: config -> `SUPABASE_URL` /
/// `SUPABASE_ANON_KEY` env vars -> error.
pub struct SupabaseBackend {
    client: SupabaseClient,
    realtime: RealtimeClient,
    messages_table: String,
    expiry_margin: chrono::Duration,
    auth: Mutex<AuthState>,
}

impl std::fmt::Debug for SupabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBackend")
            .field("base_url", &self.client.base_url().as_str())
            .field("messages_table", &self.messages_table)
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}

impl SupabaseBackend {
    /// Creates a backend from the given configuration. Nobody is signed in yet.
    pub fn new(config: &HavenConfig) -> Result<Self, HavenError> {
        let url = resolve_setting(&config.backend.url, "SUPABASE_URL", "backend.url")?;
        let anon_key =
            resolve_setting(&config.backend.anon_key, "SUPABASE_ANON_KEY", "backend.anon_key")?;

        let client = SupabaseClient::new(
            &url,
            &anon_key,
            Duration::from_secs(config.backend.request_timeout_secs),
        )?;
        let socket_url = realtime::socket_url(client.base_url(), &anon_key)?;
        let realtime = RealtimeClient::new(
            socket_url,
            Duration::from_secs(config.realtime.heartbeat_secs),
            config.chat.event_buffer,
        );

        let expiry_margin = chrono::Duration::seconds(
            i64::try_from(config.session.expiry_margin_secs).unwrap_or(i64::MAX / 1000),
        );

        info!(url = %client.base_url(), "Supabase backend initialized");

        Ok(Self {
            client,
            realtime,
            messages_table: config.chat.messages_table.clone(),
            expiry_margin,
            auth: Mutex::new(AuthState::SignedOut),
        })
    }

    /// Seeds the backend with a refresh token saved by an earlier run.
    /// It is exchanged on the next [`AuthBackend::get_session`].
    pub fn restore_session(&self, refresh_token: impl Into<String>) {
        self.set_state(AuthState::Restorable(SecretString::from(refresh_token.into())));
    }

    /// Closes every realtime channel still open.
    pub async fn shutdown(&self) {
        self.realtime.close_all().await;
    }

    fn set_state(&self, state: AuthState) {
        *self.auth.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Makes `session` current and hands its token to open realtime channels.
    fn activate(&self, session: &Session) {
        self.realtime.set_access_token(session.access_token());
        self.set_state(AuthState::Active(session.clone()));
    }

    /// Access token of the active session, if any. Data calls fall back to the anon key.
    fn bearer(&self) -> Option<String> {
        match &*self.auth.lock().unwrap_or_else(PoisonError::into_inner) {
            AuthState::Active(session) => Some(session.access_token().to_string()),
            _ => None,
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, HavenError> {
        match self.client.refresh_grant(refresh_token).await {
            Ok(token) => {
                let session = token.into_session(Utc::now());
                debug!(user = %session.user_id(), "access token refreshed");
                self.activate(&session);
                Ok(Some(session))
            }
            Err(e @ HavenError::Auth { .. }) if !e.is_transient() => {
                // A rejected refresh token cannot be retried; drop it.
                warn!(error = %e, "refresh token rejected, signing out");
                self.set_state(AuthState::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Resolves a required setting: config value if non-empty, else the env var.
fn resolve_setting(
    config_value: &Option<String>,
    env_var: &str,
    key: &str,
) -> Result<String, HavenError> {
    if let Some(value) = config_value {
        if !value.is_empty() {
            return Ok(value.clone());
        }
    }

    std::env::var(env_var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            HavenError::Config(format!(
                "{key} not set. Set {key} in config or the {env_var} environment variable."
            ))
        })
}

#[async_trait]
impl BackendAdapter for SupabaseBackend {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn health_check(&self) -> Result<HealthStatus, HavenError> {
        match self.client.health().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) if e.is_transient() => Ok(HealthStatus::Degraded(e.to_string())),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
    async fn get_session(&self) -> Result<Option<Session>, HavenError> {
        enum Next {
            Done(Option<Session>),
            Refresh(String),
        }

        let next = match &*self.auth.lock().unwrap_or_else(PoisonError::into_inner) {
            AuthState::SignedOut => Next::Done(None),
            AuthState::Restorable(token) => Next::Refresh(token.expose_secret().to_string()),
            AuthState::Active(session) => {
                if session.expires_within(self.expiry_margin, Utc::now()) {
                    Next::Refresh(session.refresh_token().to_string())
                } else {
                    Next::Done(Some(session.clone()))
                }
            }
        };

        match next {
            Next::Done(session) => Ok(session),
            Next::Refresh(token) => self.refresh(&token).await,
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, HavenError> {
        let token = self.client.password_grant(email, password).await?;
        let session = token.into_session(Utc::now());
        info!(user = %session.user_id(), "signed in");
        self.activate(&session);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), HavenError> {
        let previous = std::mem::replace(
            &mut *self.auth.lock().unwrap_or_else(PoisonError::into_inner),
            AuthState::SignedOut,
        );
        match previous {
            AuthState::Active(session) => self.client.logout(session.access_token()).await,
            AuthState::Restorable(_) | AuthState::SignedOut => Ok(()),
        }
    }
}

#[async_trait]
impl MessageStore for SupabaseBackend {
    async fn conversation_history(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<ChatMessage>, HavenError> {
        let params = [
            ("select", "*".to_string()),
            ("or", query::conversation(conversation)),
            ("order", "created_at.asc".to_string()),
        ];
        self.client
            .select(&self.messages_table, &params, self.bearer().as_deref())
            .await
    }

    async fn insert_message(&self, message: &NewChatMessage) -> Result<(), HavenError> {
        self.client
            .insert(
                &self.messages_table,
                std::slice::from_ref(message),
                self.bearer().as_deref(),
            )
            .await
    }
}

#[async_trait]
impl DirectoryStore for SupabaseBackend {
    async fn profile(&self, id: &UserId) -> Result<Profile, HavenError> {
        let params = [
            ("select", "*".to_string()),
            ("id", query::eq(id.as_str())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Profile> = self
            .client
            .select(PROFILES_TABLE, &params, self.bearer().as_deref())
            .await?;
        rows.into_iter().next().ok_or_else(|| HavenError::NotFound {
            entity: "profile".into(),
            key: id.to_string(),
        })
    }

    async fn profiles_with_roles(
        &self,
        exclude: &UserId,
        roles: &[Role],
    ) -> Result<Vec<Profile>, HavenError> {
        let mut params = vec![
            ("select", "id,email,name,surname,role,created_at".to_string()),
            ("id", query::neq(exclude.as_str())),
        ];
        match roles {
            [] => {}
            [role] => params.push(("role", query::eq(&role.to_string()))),
            many => params.push((
                "role",
                query::in_list(many.iter().map(ToString::to_string)),
            )),
        }
        self.client
            .select(PROFILES_TABLE, &params, self.bearer().as_deref())
            .await
    }

    async fn family_by_email(&self, email: &str) -> Result<Option<FamilyRecord>, HavenError> {
        let params = [
            ("select", "id,name,surname,email".to_string()),
            ("email", query::eq(email)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<FamilyRecord> = self
            .client
            .select(FAMILY_TABLE, &params, self.bearer().as_deref())
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn residents_of_family(
        &self,
        family_id: &UserId,
    ) -> Result<Vec<ResidentRecord>, HavenError> {
        let params = [
            ("select", "id,fullname,carelevel,img".to_string()),
            ("familyid", query::eq(family_id.as_str())),
        ];
        self.client
            .select(RESIDENTS_TABLE, &params, self.bearer().as_deref())
            .await
    }
}

#[async_trait]
impl RealtimeBackend for SupabaseBackend {
    async fn open_channel(&self, spec: ChannelSpec) -> Result<ChannelHandle, HavenError> {
        let token = self.bearer();
        self.realtime.open(spec, token.as_deref()).await
    }

    async fn close_channel(&self, id: &ChannelId) -> Result<(), HavenError> {
        self.realtime.close(id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_setting_prefers_config() {
        let value = resolve_setting(&Some("https://x.supabase.co".into()), "HAVEN_TEST_UNSET_URL", "backend.url");
        assert_eq!(value.unwrap(), "https://x.supabase.co");
    }

    #[test]
    fn resolve_setting_reports_missing_key() {
        let err = resolve_setting(&Some(String::new()), "HAVEN_TEST_UNSET_ANON_KEY", "backend.anon_key")
            .unwrap_err()
            .to_string();
        assert!(err.contains("backend.anon_key"), "got: {err}");
        assert!(err.contains("HAVEN_TEST_UNSET_ANON_KEY"), "got: {err}");
    }
}
