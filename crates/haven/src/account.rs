// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `haven login`, `haven logout`, and `haven session`.

use chrono::Local;
use colored::Colorize;
use haven_core::HavenError;
use secrecy::{ExposeSecret, SecretString};

use crate::app::App;

/// Signs in with `email`, prompting for the password without echo.
pub async fn run_login(app: &App, email: &str) -> Result<(), HavenError> {
    let password = rpassword::prompt_password("Password: ")
        .map(SecretString::from)
        .map_err(|e| HavenError::Internal(format!("failed to read password: {e}")))?;

    let session = app
        .coordinator
        .sign_in(email, password.expose_secret())
        .await?;

    println!(
        "{} as {} ({})",
        "Signed in".green(),
        session.user.email.as_deref().unwrap_or(email).bold(),
        session.user_id()
    );
    println!(
        "{}",
        format!("session saved to {}", app.session_file().path().display()).dimmed()
    );
    Ok(())
}

/// Signs out. The saved session is removed even if the server call fails.
pub async fn run_logout(app: &App) -> Result<(), HavenError> {
    // A restored session has no access token until it is refreshed.
    if let Err(e) = app.coordinator.get_session().await {
        tracing::debug!(error = %e, "refresh before sign-out failed");
    }
    let result = app.coordinator.sign_out().await;
    app.session_file().remove()?;
    match &result {
        Ok(()) => println!("{}", "Signed out".green()),
        Err(_) => println!("{}", "Signed out locally; the server did not confirm.".yellow()),
    }
    result
}

/// Prints who is signed in.
pub async fn run_session(app: &App) -> Result<(), HavenError> {
    let user = match haven_session::CurrentUser::resolve(&app.coordinator, app.backend.as_ref())
        .await?
    {
        Some(user) => user,
        None => {
            println!("{}", "Not signed in.".yellow());
            return Ok(());
        }
    };

    println!("  user     {}", user.id());
    println!("  email    {}", user.email().unwrap_or("-"));
    println!(
        "  role     {}",
        user.role().map_or_else(|| "-".to_string(), |r| r.to_string())
    );
    let expiry = user
        .session
        .expires_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("  expires  {expiry}");
    Ok(())
}
