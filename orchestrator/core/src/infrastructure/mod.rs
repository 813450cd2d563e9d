// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod auth;
pub mod event_bus;
pub mod inference;
pub mod runtime;
pub mod state_store;

pub use event_bus::{EventBus, EventBusError, EventReceiver, SwarmEventReceiver};
