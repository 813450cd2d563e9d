// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use swarmforge_core::domain::audit::AuditSink;
use swarmforge_core::domain::events::AuditEvent;
use swarmforge_core::infrastructure::event_bus::{EventBus, EventBusError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Feed lifecycle transitions from the event bus into `sink`. Telemetry-only
/// events are skipped; sink failures are logged and the forwarder keeps going.
pub fn spawn_audit_forwarder(events: &EventBus, sink: Arc<dyn AuditSink>) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(record) = AuditEvent::from_swarm_event(&event) else {
                        continue;
                    };
                    if let Err(e) = sink.emit(record).await {
                        warn!(action = event.action(), swarm_id = %event.swarm_id(), "Audit sink rejected event: {}", e);
                    }
                }
                Err(EventBusError::Lagged(n)) => {
                    warn!("Audit forwarder dropped {} events", n);
                }
                Err(_) => {
                    debug!("Event bus closed, audit forwarder exiting");
                    break;
                }
            }
        }
    })
}
