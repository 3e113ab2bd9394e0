// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are mapped onto [`ConfigError`] with the offending key
//! highlighted in the TOML file it came from, plus a "did you mean" hint
//! for misspelled keys.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::path::{Path, PathBuf};

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(haven::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted where `key` appeared.
        valid_keys: String,
        #[label("not a haven setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(haven::config::invalid_type), help("use a {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(code(haven::config::invalid_value), help("expected one of: {expected}"))]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(haven::config::missing_key), help("add `{key} = ...` to haven.toml"))]
    MissingKey { key: String },

    #[error("config file {} does not exist", path.display())]
    #[diagnostic(
        code(haven::config::missing_file),
        help("check the path given to --config")
    )]
    MissingFile { path: PathBuf },

    /// A value that parsed but makes no sense, e.g. a zero cooldown.
    #[error("{key}: {message}")]
    #[diagnostic(code(haven::config::validation))]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(haven::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Maps every error inside `err` to a diagnostic.
    pub fn from_figment(err: figment::Error, sources: &TomlSources) -> Vec<Self> {
        err.into_iter()
            .map(|error| match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = sources.highlight(&error, field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: closest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, expected) => ConfigError::InvalidValue {
                    key: dotted_path(&error),
                    value: value.clone(),
                    expected: expected.join(", "),
                },
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: dotted_path(&error),
                    detail: format!("found {actual}"),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            })
            .collect()
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn dotted_path(error: &figment::error::Error) -> String {
    error.path.join(".")
}

/// One TOML file that took part in a load.
#[derive(Debug, Clone)]
pub struct TomlSource {
    pub name: String,
    pub content: String,
}

/// The TOML files a load read, kept so errors can point into them.
#[derive(Debug, Clone, Default)]
pub struct TomlSources(Vec<TomlSource>);

impl TomlSources {
    /// An in-memory document, reported under `name`.
    pub fn inline(name: &str, content: &str) -> Self {
        Self(vec![TomlSource {
            name: name.to_string(),
            content: content.to_string(),
        }])
    }

    /// Reads whichever of `paths` exist. Unreadable files are skipped.
    pub fn read(paths: &[PathBuf]) -> Self {
        Self(
            paths
                .iter()
                .filter_map(|path| {
                    let content = std::fs::read_to_string(path).ok()?;
                    Some(TomlSource {
                        name: display_name(path),
                        content,
                    })
                })
                .collect(),
        )
    }

    /// The file `error` was raised for. Errors from inline strings carry no
    /// path, so a lone source is assumed to be theirs.
    fn origin(&self, error: &figment::error::Error) -> Option<&TomlSource> {
        let file = error
            .metadata
            .as_ref()
            .and_then(|m| m.source.as_ref())
            .and_then(|s| match s {
                figment::Source::File(path) => Some(display_name(path)),
                _ => None,
            });
        match file {
            Some(name) => self.0.iter().find(|s| s.name == name),
            None if self.0.len() == 1 => self.0.first(),
            None => None,
        }
    }

    fn highlight(
        &self,
        error: &figment::error::Error,
        field: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let Some(source) = self.origin(error) else {
            return (None, None);
        };
        match key_span(&source.content, error.path.first().map(String::as_str), field) {
            Some(span) => (
                Some(span),
                Some(NamedSource::new(&source.name, source.content.clone())),
            ),
            None => (None, None),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}

/// Span of `field` as a key inside `[section]`. With no section, `field` is
/// a top-level key or a table header.
pub fn key_span(content: &str, section: Option<&str>, field: &str) -> Option<SourceSpan> {
    let mut in_section = section.is_none();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            if section.is_none() && header == field {
                let at = start + line.find(field)?;
                return Some(SourceSpan::new(at.into(), field.len()));
            }
            in_section = section.is_some() && Some(header) == section;
            continue;
        }
        if !in_section {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let key = line[indent..].split('=').next().map(str::trim);
        if key == Some(field) {
            return Some(SourceSpan::new((start + indent).into(), field.len()));
        }
    }
    None
}

/// The accepted key most similar to `unknown`, if any is close enough.
pub fn closest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr as a miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
