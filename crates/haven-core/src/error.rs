// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Haven client core.

use thiserror::Error;

/// The primary error type used across all Haven adapter traits and core operations.
#[derive(Debug, Error)]
pub enum HavenError {
    /// Configuration errors (invalid TOML, missing backend URL, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Auth service errors (rejected credentials, expired refresh token).
    #[error("auth error: {message}")]
    Auth {
        message: String,
        /// HTTP status reported by the auth service, if any.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Relational storage errors (query failure, insert rejected, bad payload).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        /// HTTP status reported by the backend, if any.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Realtime channel errors (connect failure, join rejected, socket closed).
    #[error("realtime error: {message}")]
    Realtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single-row lookup matched nothing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HavenError {
    /// Shorthand for a backend error without a status or source.
    pub fn backend(message: impl Into<String>) -> Self {
        HavenError::Backend {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Shorthand for an auth error without a status or source.
    pub fn auth(message: impl Into<String>) -> Self {
        HavenError::Auth {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Shorthand for a realtime error without a source.
    pub fn realtime(message: impl Into<String>) -> Self {
        HavenError::Realtime {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for failures that may succeed on a later attempt:
    /// network errors, timeouts, rate limiting, and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            HavenError::Timeout { .. } | HavenError::Realtime { .. } => true,
            HavenError::Auth { status, source, .. } | HavenError::Backend { status, source, .. } => {
                match status {
                    Some(code) => *code == 429 || *code >= 500,
                    // No status means the request never got a response.
                    None => source.is_some(),
                }
            }
            _ => false,
        }
    }
}
