// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit Sinks
//!
//! - [`TracingAuditSink`] writes structured audit records to the `audit`
//!   tracing target, for log pipelines to pick up
//! - [`MemoryAuditSink`] keeps records in memory for tests and the CLI's
//!   one-shot mode

use crate::domain::audit::{AuditError, AuditSink};
use crate::domain::events::{AuditEvent, AuditSeverity};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| AuditError::Rejected(e.to_string()))?;

        match event.severity {
            AuditSeverity::Warning => warn!(
                target: "audit",
                category = %event.category,
                swarm_id = %event.swarm_id,
                action = %event.action,
                actor = %event.actor,
                timestamp = %event.timestamp,
                metadata = %metadata,
                "Swarm lifecycle audit"
            ),
            AuditSeverity::Info | AuditSeverity::Notice => info!(
                target: "audit",
                category = %event.category,
                severity = ?event.severity,
                swarm_id = %event.swarm_id,
                action = %event.action,
                actor = %event.actor,
                timestamp = %event.timestamp,
                metadata = %metadata,
                "Swarm lifecycle audit"
            ),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.action.clone()).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event);
        Ok(())
    }
}
