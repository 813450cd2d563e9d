// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Application Layer
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`lifecycle`] | `SwarmLifecycleManager`, the public operation set |
//! | [`autoscaler`] | `AutoScaler` control loops and `ScalePolicy` |
//! | [`decision`] | `DecisionRouter` (local inference, then fallback) |
//! | [`audit_forwarder`] | event bus → audit sink bridge |

pub mod audit_forwarder;
pub mod autoscaler;
pub mod decision;
pub mod lifecycle;

pub use audit_forwarder::spawn_audit_forwarder;
pub use autoscaler::{AutoScaler, ScaleDirective, ScalePolicy, ScalerState, TickOutcome};
pub use decision::DecisionRouter;
pub use lifecycle::{
    KillOutcome, LifecycleSettings, RemovalMode, RemovedAgent, ScaleOutcome, SwarmLifecycleManager,
};
