// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `haven doctor` command implementation.
//!
//! Runs diagnostic checks against the configured backend to identify
//! connectivity, auth, and realtime problems.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use haven_core::types::{ChannelSpec, HealthStatus};
use haven_core::{BackendAdapter, HavenError, RealtimeBackend};
use haven_session::SessionCoordinator;

use crate::app::App;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `haven doctor` command. With `plain`, disables colored output.
pub async fn run_doctor(app: &App, plain: bool) -> Result<(), HavenError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let has_saved_session = app.session_file().load().is_some();
    let results = vec![
        CheckResult::new("Configuration", CheckStatus::Pass, "valid", Instant::now()),
        check_backend(app.backend.as_ref()).await,
        check_session(&app.coordinator, has_saved_session).await,
        check_realtime(app.backend.as_ref()).await,
    ];

    println!();
    println!("  haven doctor");
    println!("  {}", "-".repeat(50));

    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    use colored::Colorize;

    let duration_ms = result.duration.as_millis();
    let (symbol, tag, message) = match result.status {
        CheckStatus::Pass => ("✓".green(), "[OK]  ", result.message.normal()),
        CheckStatus::Warn => ("!".yellow(), "[WARN]", result.message.yellow()),
        CheckStatus::Fail => ("✗".red(), "[FAIL]", result.message.red()),
    };
    if use_color {
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check the backend answers its health endpoint.
async fn check_backend(backend: &dyn BackendAdapter) -> CheckResult {
    let start = Instant::now();
    let name = "Backend";
    match backend.health_check().await {
        Ok(HealthStatus::Healthy) => {
            CheckResult::new(name, CheckStatus::Pass, format!("{} reachable", backend.name()), start)
        }
        Ok(HealthStatus::Degraded(reason)) => CheckResult::new(name, CheckStatus::Warn, reason, start),
        Ok(HealthStatus::Unhealthy(reason)) => CheckResult::new(name, CheckStatus::Fail, reason, start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Check a saved session can still be refreshed.
async fn check_session(coordinator: &SessionCoordinator, has_saved_session: bool) -> CheckResult {
    let start = Instant::now();
    let name = "Session";
    match coordinator.get_session().await {
        Ok(Some(session)) => CheckResult::new(
            name,
            CheckStatus::Pass,
            format!("signed in as {}", session.user_id()),
            start,
        ),
        Ok(None) if has_saved_session => CheckResult::new(
            name,
            CheckStatus::Fail,
            "saved session was rejected; run `haven login`",
            start,
        ),
        Ok(None) => CheckResult::new(name, CheckStatus::Warn, "not signed in", start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Check a realtime channel can be joined and left.
async fn check_realtime(realtime: &dyn RealtimeBackend) -> CheckResult {
    let start = Instant::now();
    let name = "Realtime";
    let spec = ChannelSpec {
        name: "haven-doctor".into(),
        bindings: Vec::new(),
    };
    match realtime.open_channel(spec).await {
        Ok(handle) => match realtime.close_channel(&handle.id).await {
            Ok(()) => CheckResult::new(name, CheckStatus::Pass, "channel joined", start),
            Err(e) => CheckResult::new(name, CheckStatus::Warn, format!("close failed: {e}"), start),
        },
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use haven_test_utils::MockBackend;

    #[tokio::test]
    async fn healthy_mock_passes_backend_and_realtime() {
        let backend = Arc::new(MockBackend::new());
        assert_eq!(check_backend(backend.as_ref()).await.status, CheckStatus::Pass);

        let realtime = check_realtime(backend.as_ref()).await;
        assert_eq!(realtime.status, CheckStatus::Pass);
        assert_eq!(backend.open_channel_count().await, 0);
    }

    #[tokio::test]
    async fn realtime_failure_fails_check() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_open(true);
        assert_eq!(check_realtime(backend.as_ref()).await.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn session_check_distinguishes_signed_out_from_rejected() {
        let backend = Arc::new(MockBackend::new());
        let coordinator = SessionCoordinator::new(backend.clone());

        assert_eq!(check_session(&coordinator, false).await.status, CheckStatus::Warn);

        let coordinator = SessionCoordinator::new(backend.clone());
        assert_eq!(check_session(&coordinator, true).await.status, CheckStatus::Fail);

        backend
            .set_session(Some(MockBackend::session_for("u1")))
            .await;
        let coordinator = SessionCoordinator::new(backend);
        let result = check_session(&coordinator, true).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("u1"));
    }

    #[test]
    fn plain_lines_use_tags() {
        let result = CheckResult {
            name: "Backend".into(),
            status: CheckStatus::Warn,
            message: "slow".into(),
            duration: Duration::from_millis(12),
        };
        let line = render_line(&result, false);
        assert!(line.starts_with("    [WARN] Backend"));
        assert!(line.ends_with("slow (12ms)"));
    }
}
