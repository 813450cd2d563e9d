// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! State Store Implementations
//!
//! Adapters for the [`StateStore`](crate::domain::repository::StateStore) port.
//!
//! - **InMemoryStateStore** - process-local map with TTL expiry, used in tests
//!   and when no state path is configured
//! - **FileStateStore** - single JSON document on disk, survives restarts

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
