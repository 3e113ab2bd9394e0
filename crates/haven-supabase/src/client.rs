// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the GoTrue auth and PostgREST endpoints of a Supabase project.
//!
//! Provides [`SupabaseClient`], which attaches the project `apikey` header to
//! every request and maps non-success responses onto [`HavenError`].

use std::time::Duration;

use haven_core::HavenError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{ApiErrorBody, PasswordGrant, RefreshGrant, TokenResponse};

/// Which service a request went to. Decides the error variant on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Auth,
    Rest,
}

/// HTTP client for one Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    timeout: Duration,
}

impl SupabaseClient {
    /// Creates a client for the project at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - Project URL, e.g. `https://xyzcompany.supabase.co`
    /// * `anon_key` - Public anon key, sent as `apikey` and as the bearer when signed out
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, HavenError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HavenError::Config(format!("invalid backend url `{base_url}`: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HavenError::Config(format!(
                "backend url `{base_url}` cannot carry a path"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(anon_key).map_err(|e| {
                HavenError::Config(format!("invalid anon key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HavenError::Backend {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            anon_key: SecretString::from(anon_key.to_string()),
            timeout,
        })
    }

    /// The project URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The public anon key.
    pub fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }

    // --- GoTrue ---

    /// Exchanges email and password for a session.
    pub async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, HavenError> {
        let url = self.token_url("password")?;
        let response = self
            .send(
                Service::Auth,
                self.client
                    .post(url)
                    .bearer_auth(self.anon_key())
                    .json(&PasswordGrant { email, password }),
            )
            .await?;
        self.read_json(Service::Auth, response).await
    }

    /// Exchanges a refresh token for a new session. The old refresh token is spent.
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, HavenError> {
        let url = self.token_url("refresh_token")?;
        let response = self
            .send(
                Service::Auth,
                self.client
                    .post(url)
                    .bearer_auth(self.anon_key())
                    .json(&RefreshGrant { refresh_token }),
            )
            .await?;
        self.read_json(Service::Auth, response).await
    }

    /// Revokes the refresh tokens of the session `access_token` belongs to.
    pub async fn logout(&self, access_token: &str) -> Result<(), HavenError> {
        let url = self.endpoint(&["auth", "v1", "logout"])?;
        self.send(
            Service::Auth,
            self.client.post(url).bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    /// Probes the auth service.
    pub async fn health(&self) -> Result<(), HavenError> {
        let url = self.endpoint(&["auth", "v1", "health"])?;
        self.send(Service::Auth, self.client.get(url)).await?;
        Ok(())
    }

    // --- PostgREST ---

    /// Reads rows from `table`. `params` are PostgREST query parameters
    /// such as `("id", "eq.42")` or `("order", "created_at.asc")`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<Vec<T>, HavenError> {
        let mut url = self.endpoint(&["rest", "v1", table])?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        debug!(table, query = url.query().unwrap_or_default(), "select");

        let response = self
            .send(
                Service::Rest,
                self.client
                    .get(url)
                    .bearer_auth(bearer.unwrap_or(self.anon_key())),
            )
            .await?;
        self.read_json(Service::Rest, response).await
    }

    /// Inserts one row into `table` without reading it back.
    pub async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
        bearer: Option<&str>,
    ) -> Result<(), HavenError> {
        let url = self.endpoint(&["rest", "v1", table])?;
        debug!(table, "insert");
        self.send(
            Service::Rest,
            self.client
                .post(url)
                .bearer_auth(bearer.unwrap_or(self.anon_key()))
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    // --- Plumbing ---

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HavenError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HavenError::Config(format!("backend url `{}` cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn token_url(&self, grant_type: &str) -> Result<Url, HavenError> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    /// Sends a request and turns transport failures and non-success statuses into errors.
    async fn send(
        &self,
        service: Service,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, HavenError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HavenError::Timeout {
                    duration: self.timeout,
                }
            } else {
                service.error(format!("HTTP request failed: {e}"), None, Some(Box::new(e)))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(service.error(error_message(status, &body), Some(status.as_u16()), None))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        service: Service,
        response: Response,
    ) -> Result<T, HavenError> {
        let body = response.text().await.map_err(|e| {
            service.error(
                format!("failed to read response body: {e}"),
                None,
                Some(Box::new(e)),
            )
        })?;
        serde_json::from_str(&body).map_err(|e| {
            service.error(
                format!("failed to parse response: {e}"),
                None,
                Some(Box::new(e)),
            )
        })
    }
}

impl Service {
    fn error(
        self,
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> HavenError {
        match self {
            Service::Auth => HavenError::Auth {
                message,
                status,
                source,
            },
            Service::Rest => HavenError::Backend {
                message,
                status,
                source,
            },
        }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.summary())
    {
        Some(summary) => format!("{summary} [{status}]"),
        None if body.is_empty() => format!("request returned {status}"),
        None => format!("request returned {status}: {body}"),
    }
}
