// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! SwarmForge Core
//!
//! Domain model, ports and infrastructure adapters for the swarm control plane.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Everything the lifecycle manager depends on, without the
//!   lifecycle manager itself (see `swarmforge-swarm`)

pub mod domain;
pub mod infrastructure;

pub use domain::*;
