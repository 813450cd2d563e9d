// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Swarm control-plane entities, value objects and ports.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and trait boundaries shared by the swarm
//!   lifecycle crate, the infrastructure adapters and the CLI

pub mod agent;
pub mod audit;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod health;
pub mod inference;
pub mod repository;
pub mod runtime;
pub mod security;
pub mod swarm;
