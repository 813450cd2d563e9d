// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::events::AuditEvent;
use async_trait::async_trait;

/// Append-only audit trail. Delivery is at-least-once and the control plane
/// never waits on acknowledgement from the operation that caused the event.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("Audit event rejected: {0}")]
    Rejected(String),
}
