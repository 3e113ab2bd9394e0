// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The refresh token kept between CLI runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use haven_core::{HavenError, Session, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What `haven login` leaves on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub refresh_token: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id().clone(),
            email: session.user.email.clone(),
            refresh_token: session.refresh_token().to_string(),
            saved_at: Utc::now(),
        }
    }
}

/// JSON file holding a [`StoredSession`], written atomically with owner-only permissions.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<StoredSession> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read session file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed session file");
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), HavenError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| io_error("create session directory", &dir, e))?;

        let json = serde_json::to_string_pretty(&StoredSession::from_session(session))
            .map_err(|e| HavenError::Internal(format!("failed to encode session: {e}")))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| io_error("create temp file in", &dir, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| io_error("write", file.path(), e))?;
        restrict_permissions(file.path())?;
        file.persist(&self.path)
            .map_err(|e| io_error("replace", &self.path, e.error))?;

        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Deletes the file. Removing a missing file succeeds.
    pub fn remove(&self) -> Result<(), HavenError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &self.path, e)),
        }
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> HavenError {
    HavenError::Internal(format!("failed to {action} {}: {e}", path.display()))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), HavenError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_error("set permissions on", path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), HavenError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::types::AuthUser;

    fn session() -> Session {
        Session::new(
            AuthUser {
                id: "u1".into(),
                email: Some("u1@example.com".into()),
            },
            None,
            "access",
            "refresh-1",
        )
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));

        file.save(&session()).unwrap();
        let stored = file.load().unwrap();
        assert_eq!(stored.user_id.as_str(), "u1");
        assert_eq!(stored.email.as_deref(), Some("u1@example.com"));
        assert_eq!(stored.refresh_token, "refresh-1");
    }

    #[test]
    fn access_token_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&session()).unwrap();

        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert!(!raw.contains("\"access\""));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&session()).unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_and_malformed_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().is_none());

        std::fs::write(file.path(), "{not json").unwrap();
        assert!(file.load().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&session()).unwrap();

        file.remove().unwrap();
        assert!(!file.path().exists());
        file.remove().unwrap();
    }
}
