// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordinator (per-swarm decision role)
//!
//! One [`Coordinator`] exists per swarm. It holds no reasoning logic itself;
//! it gates access to the decision router with a bounded in-flight counter and
//! remembers where its last decision came from.

use crate::domain::error::SwarmError;
use crate::domain::swarm::{SwarmId, SwarmStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    LocalInference,
    Fallback,
    None,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::LocalInference => f.write_str("local-inference"),
            DecisionSource::Fallback => f.write_str("fallback"),
            DecisionSource::None => f.write_str("none"),
        }
    }
}

/// A routed decision, tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub swarm_id: SwarmId,
    pub text: String,
    pub source: DecisionSource,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub latency_ms: u64,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Coordinator {
    swarm_id: SwarmId,
    max_in_flight: usize,
    pending: AtomicUsize,
    accepting: AtomicBool,
    degraded: AtomicBool,
    last_source: Mutex<DecisionSource>,
}

impl Coordinator {
    pub fn new(swarm_id: SwarmId, max_in_flight: usize) -> Self {
        Self {
            swarm_id,
            max_in_flight,
            pending: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            degraded: AtomicBool::new(false),
            last_source: Mutex::new(DecisionSource::None),
        }
    }

    pub fn swarm_id(&self) -> SwarmId {
        self.swarm_id
    }

    /// Reserve an in-flight slot. The slot is returned when the guard drops.
    pub fn try_begin(self: &Arc<Self>) -> Result<PendingDecision, SwarmError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SwarmError::InvalidState {
                swarm_id: self.swarm_id,
                status: SwarmStatus::Draining,
                operation: "query_decision",
            });
        }

        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            if current >= self.max_in_flight {
                return Err(SwarmError::Backpressure {
                    swarm_id: self.swarm_id,
                    in_flight: current,
                    cap: self.max_in_flight,
                });
            }
            match self.pending.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(PendingDecision {
                        coordinator: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn record(&self, source: DecisionSource) {
        *self.last_source.lock() = source;
        self.degraded.store(false, Ordering::Release);
    }

    /// Both backends failed this cycle; the swarm reports as degraded until
    /// the next successful decision.
    pub fn record_unavailable(&self) {
        self.degraded.store(true, Ordering::Release);
    }

    /// Stop admitting new decision requests. Requests already in flight run to
    /// completion and their results are discarded by the caller.
    pub fn reject_new(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn last_source(&self) -> DecisionSource {
        *self.last_source.lock()
    }
}

/// RAII guard for one in-flight decision request.
#[derive(Debug)]
pub struct PendingDecision {
    coordinator: Arc<Coordinator>,
}

impl Drop for PendingDecision {
    fn drop(&mut self) {
        self.coordinator.pending.fetch_sub(1, Ordering::AcqRel);
    }
}
