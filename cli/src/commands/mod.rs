// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the SwarmForge CLI

pub mod config;
pub mod swarm;

pub use self::config::ConfigCommand;
pub use self::swarm::{CommandContext, SwarmCommand};

use swarmforge_core::domain::error::SwarmError;

/// Process exit code for a failed command: the [`SwarmError`] taxonomy code
/// when the failure came from a lifecycle operation, `1` otherwise.
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<SwarmError>()
        .map(SwarmError::exit_code)
        .unwrap_or(1)
}
