// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `haven chat` command implementation.
//!
//! Opens one conversation, prints its history and every message that
//! arrives afterwards, and sends each line typed at the prompt. Sent lines
//! are printed when the backend echoes them, like any other message.

use std::collections::HashSet;

use chrono::Local;
use colored::Colorize;
use haven_chat::{Composer, MessageLog, SendOutcome, SkipReason, ViewState};
use haven_core::{ChatMessage, DirectoryStore, HavenError, MessageId, UserId};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::watch;
use tracing::debug;

use crate::app::App;

/// Runs the `haven chat --with <peer>` REPL.
pub async fn run_chat(app: &App, peer: UserId) -> Result<(), HavenError> {
    let user = app.require_user().await?;
    if &peer == user.id() {
        return Err(HavenError::Config("cannot open a conversation with yourself".into()));
    }
    let peer_label = peer_label(app.backend.as_ref(), &peer).await;

    let mut view = app.conversation_view(&user);
    if let Err(e) = view.open(peer.clone()).await {
        if view.state() != ViewState::Live {
            return Err(e);
        }
        eprintln!("{}: could not load history: {e}", "warning".yellow());
    }
    let Some(log) = view.watch() else {
        return Err(HavenError::Internal("conversation closed while opening".into()));
    };
    let printer = tokio::spawn(print_messages(log, user.id().clone(), peer_label.clone()));

    let mut rl = DefaultEditor::new()
        .map_err(|e| HavenError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{} {}", "chatting with".bold().green(), peer_label.bold());
    println!("Type {} to exit.\n", "/quit".yellow());

    let prompt = format!("{}> ", "haven".green());
    let mut composer = Composer::new();
    loop {
        let draft = composer.draft().to_string();
        let line = tokio::task::block_in_place(|| rl.readline_with_initial(&prompt, (&draft, "")));
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(&line);
                }

                composer.set_draft(line);
                match composer.submit_to(&view).await {
                    Ok(SendOutcome::Sent) => debug!("message sent"),
                    Ok(SendOutcome::Skipped(SkipReason::EmptyBody)) => composer.clear(),
                    Ok(SendOutcome::Skipped(reason)) => {
                        eprintln!("{}", format!("not sent: {reason:?}").yellow());
                    }
                    Err(e) => {
                        // The draft is kept and offered again at the next prompt.
                        eprintln!("{}: {e}", "send failed".red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    printer.abort();
    view.close().await;
    Ok(())
}

/// Display name for the peer, falling back to the id.
async fn peer_label(directory: &dyn DirectoryStore, peer: &UserId) -> String {
    match directory.profile(peer).await {
        Ok(profile) => match (profile.name.as_deref(), profile.surname.as_deref()) {
            (Some(name), Some(surname)) if !surname.is_empty() => format!("{name} {surname}"),
            (Some(name), _) if !name.is_empty() => name.to_string(),
            _ => profile.email.unwrap_or_else(|| peer.to_string()),
        },
        Err(e) => {
            debug!(%peer, error = %e, "peer profile unavailable");
            peer.to_string()
        }
    }
}

/// Prints every message once, in list order, as the list changes.
async fn print_messages(mut log: watch::Receiver<MessageLog>, self_id: UserId, peer_label: String) {
    let mut printed: HashSet<MessageId> = HashSet::new();
    loop {
        let fresh: Vec<ChatMessage> = {
            let current = log.borrow_and_update();
            current
                .items()
                .iter()
                .filter(|m| !printed.contains(&m.id))
                .cloned()
                .collect()
        };
        for message in fresh {
            println!("{}", format_message(&message, &self_id, &peer_label));
            printed.insert(message.id);
        }
        if log.changed().await.is_err() {
            break;
        }
    }
}

/// `[HH:MM] who: body`
fn format_message(message: &ChatMessage, self_id: &UserId, peer_label: &str) -> String {
    let time = message.created_at.with_timezone(&Local).format("%H:%M");
    let who = if &message.sender == self_id {
        "you".cyan().to_string()
    } else {
        peer_label.magenta().to_string()
    };
    format!("{} {who}: {}", format!("[{time}]").dimmed(), message.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, body: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId("1".into()),
            sender: sender.into(),
            receiver: "other".into(),
            body: body.into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn own_messages_are_labelled_you() {
        colored::control::set_override(false);
        let line = format_message(&message("me", "hello"), &"me".into(), "Ada Lee");
        assert!(line.ends_with("you: hello"), "{line}");

        let line = format_message(&message("ada", "hi"), &"me".into(), "Ada Lee");
        assert!(line.ends_with("Ada Lee: hi"), "{line}");
        assert!(line.starts_with('['));
    }
}
