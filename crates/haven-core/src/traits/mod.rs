// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the backend service.
//!
//! All adapters extend the [`BackendAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod directory;
pub mod message;
pub mod realtime;

pub use adapter::BackendAdapter;
pub use auth::AuthBackend;
pub use directory::DirectoryStore;
pub use message::MessageStore;
pub use realtime::RealtimeBackend;
