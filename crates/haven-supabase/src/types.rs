// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GoTrue and PostgREST request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use haven_core::types::AuthUser;
use haven_core::Session;

// --- GoTrue ---

/// Body of `POST /auth/v1/token?grant_type=password`.
#[derive(Debug, Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/v1/token?grant_type=refresh_token`.
#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

/// Successful token grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp. Preferred over `expires_in`.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    /// Converts the grant into a session, resolving expiry against `now`.
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });
        Session::new(self.user, expires_at, self.access_token, self.refresh_token)
    }
}

// --- Errors ---

/// Error body returned by GoTrue or PostgREST.
///
/// GoTrue uses `error`/`error_description` (older) or `msg`/`error_code`;
/// PostgREST uses `message`/`code`/`details`/`hint`.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ApiErrorBody {
    /// The most specific human-readable message present.
    pub fn summary(&self) -> Option<String> {
        let text = self
            .message
            .as_ref()
            .or(self.msg.as_ref())
            .or(self.error_description.as_ref())
            .or(self.error.as_ref())?;
        let code = self.error_code.clone().or_else(|| match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        });
        Some(match code {
            Some(code) => format!("{text} ({code})"),
            None => text.clone(),
        })
    }
}
