// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! In-memory bookkeeping for running swarms. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`registry`] | `SwarmRegistry`, `SwarmHandle`, `SwarmState`, `ActiveSwarmCounter` |
//! | [`snapshot`] | `SwarmSnapshot` (persisted form + crash recovery rules) |

pub mod registry;
pub mod snapshot;

pub use registry::*;
pub use snapshot::*;
