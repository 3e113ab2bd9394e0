// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `haven partners`: who the signed-in user can message.

use colored::Colorize;
use haven_chat::{ChatPartner, RoleFilter};
use haven_core::HavenError;

use crate::app::App;

pub async fn run_partners(app: &App, filter: RoleFilter) -> Result<(), HavenError> {
    let user = app.require_user().await?;
    let partners = app.directory().partners(user.id()).await?;
    let shown = filter.apply(&partners);

    if shown.is_empty() {
        println!("{}", "No chat partners.".yellow());
        return Ok(());
    }
    for partner in shown {
        println!("{}", partner_line(partner));
    }
    Ok(())
}

/// `  <name>  <role>  <id>`, with care level for residents.
fn partner_line(partner: &ChatPartner) -> String {
    let role = partner
        .role
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    let mut line = format!(
        "  {:<28} {:<9} {}",
        partner.display_name(),
        role,
        partner.id
    );
    if let Some(level) = partner.care_level.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!("  (care: {level})"));
    }
    line
}
