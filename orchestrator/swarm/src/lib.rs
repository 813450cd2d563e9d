// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Lifecycle Crate
//!
//! Spawns, scales and tears down pools of worker agents ("swarms"), each with
//! a coordinator that routes strategic questions to a reasoning backend.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SwarmRegistry`, `SwarmHandle`, `SwarmSnapshot` |
//! | [`application`] | Application | `SwarmLifecycleManager`, `AutoScaler`, `DecisionRouter` |
//!
//! ## Key Concepts
//!
//! - **Capacity**: at most `max_active_swarms` swarms in
//!   `spawning|active|scaling` at once, enforced by an atomic reservation
//!   taken before any work starts.
//! - **Drain**: a busy agent being removed leaves the active pool at once,
//!   gets a graceful-stop signal, and is terminated when it reports idle or
//!   when the drain timeout elapses.
//! - **Auto-scaling**: utilization thresholds with a step of 25% and a
//!   cooldown window between actions.
//! - **Recovery**: every mutation persists a snapshot; `restore` rebuilds the
//!   registry after a restart.

pub mod application;
pub mod domain;

pub use application::*;
pub use domain::*;
