// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered loading of `haven.toml` files and `HAVEN_*` variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HavenConfig;

/// Loads the full layered configuration.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/haven/haven.toml` (system-wide)
/// 3. `~/.config/haven/haven.toml` (user XDG config)
/// 4. `./haven.toml` (local directory)
/// 5. `HAVEN_*` environment variables
pub fn load_config() -> Result<HavenConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HavenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HavenConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads defaults, one explicit file, then `HAVEN_*` overrides.
pub fn load_config_from_path(path: &Path) -> Result<HavenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HavenConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order: system, user, then the working directory.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/haven/haven.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("haven").join("haven.toml"));
    }
    paths.push(
        std::env::current_dir()
            .map(|dir| dir.join("haven.toml"))
            .unwrap_or_else(|_| PathBuf::from("haven.toml")),
    );
    paths
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(HavenConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// `HAVEN_<SECTION>_<KEY>` variables, mapped to `section.key`.
///
/// Only the first underscore after the section splits:
/// `HAVEN_BACKEND_ANON_KEY` is `backend.anon_key`, not `backend.anon.key`.
fn env_provider() -> Env {
    Env::prefixed("HAVEN_").map(|key| {
        let mapped = key
            .as_str()
            .to_ascii_lowercase()
            .replacen("backend_", "backend.", 1)
            .replacen("session_", "session.", 1)
            .replacen("chat_", "chat.", 1)
            .replacen("realtime_", "realtime.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}
