// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session coordination for the Haven client.
//!
//! [`SessionCoordinator`] is the single source of truth for "who is signed
//! in". It coalesces concurrent refreshes into one auth call, serves a cached
//! session during a short cooldown, and fans changes out to registered
//! listeners. [`CurrentUser`] joins the session with the user's profile row.

pub mod coordinator;
pub mod current_user;
pub mod listeners;

pub use coordinator::{DEFAULT_REFRESH_COOLDOWN, SessionCoordinator, SessionResult};
pub use current_user::CurrentUser;
pub use listeners::ListenerHandle;
