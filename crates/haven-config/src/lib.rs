// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Haven care-messaging client.
//!
//! Strict TOML parsing (`deny_unknown_fields`), XDG file lookup, `HAVEN_*`
//! environment overrides, and miette diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use haven_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("cooldown: {}s", config.session.refresh_cooldown_secs);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, TomlSources, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{HavenConfig, MergePolicy};

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment errors are converted to diagnostics pointing into the file that
/// caused them; a config that deserializes is then checked by
/// [`validation::validate_config`].
pub fn load_and_validate() -> Result<HavenConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        TomlSources::read(&loader::search_paths())
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<HavenConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        TomlSources::inline("<inline>", toml_content)
    })
}

/// Load configuration from an explicit file (`haven --config <path>`) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<HavenConfig, Vec<ConfigError>> {
    if !path.is_file() {
        return Err(vec![ConfigError::MissingFile {
            path: path.to_path_buf(),
        }]);
    }
    finish(loader::load_config_from_path(path), || {
        TomlSources::read(&[path.to_path_buf()])
    })
}

/// Sources are only read when there is an error to point into.
fn finish(
    loaded: Result<HavenConfig, figment::Error>,
    sources: impl FnOnce() -> TomlSources,
) -> Result<HavenConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(ConfigError::from_figment(err, &sources())),
    }
}
