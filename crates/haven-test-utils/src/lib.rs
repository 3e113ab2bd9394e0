// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Haven integration tests.
//!
//! Provides an in-memory backend and a harness for fast, deterministic tests
//! without a live auth, storage, or realtime service.
//!
//! # Components
//!
//! - [`MockBackend`] - Auth, message, directory, and realtime backend in one,
//!   with call counters, gates, failure injection, and insert echo
//! - [`ChatHarness`] - Wires the mock backend to coordinators, views, and directories

pub mod harness;
pub mod mock_backend;

pub use harness::{ChatHarness, wait_for_len};
pub use mock_backend::{ChannelEvent, MockBackend};
