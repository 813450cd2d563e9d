// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Auto-Scaler
//!
//! One control loop per auto-scaled swarm. Each iteration reads the swarm's
//! status, evaluates the [`ScalePolicy`] and, when a threshold is crossed
//! outside the cooldown window, calls the public `scale_swarm` operation with
//! the scaler's own service token.
//!
//! A loop wakes on its interval or on a `UtilizationChanged` event for its
//! swarm, and exits once the swarm is draining, terminated or gone.
//!
//! [`AutoScaler::supervise`] starts loops for existing auto-scaled swarms and
//! for every swarm spawned later with `auto_scale` set.

use crate::application::lifecycle::SwarmLifecycleManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_core::domain::config::AutoScaleConfig;
use swarmforge_core::domain::error::SwarmError;
use swarmforge_core::domain::events::SwarmEvent;
use swarmforge_core::domain::health::UtilizationSnapshot;
use swarmforge_core::domain::swarm::{SwarmId, SwarmStatus};
use swarmforge_core::infrastructure::event_bus::{EventBusError, SwarmEventReceiver};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScalePolicy {
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub step_fraction: f64,
    pub cooldown: Duration,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self::from_config(&AutoScaleConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirective {
    Up { target: usize },
    Down { target: usize },
    Hold,
}

impl ScalePolicy {
    pub fn from_config(config: &AutoScaleConfig) -> Self {
        Self {
            scale_up_threshold: config.scale_up_threshold,
            scale_down_threshold: config.scale_down_threshold,
            step_fraction: config.step_fraction,
            cooldown: config.cooldown,
        }
    }

    /// `max(1, ceil(total * step_fraction))`
    pub fn step(&self, total: usize) -> usize {
        ((total as f64 * self.step_fraction).ceil() as usize).max(1)
    }

    pub fn evaluate(
        &self,
        snapshot: UtilizationSnapshot,
        min_workers: usize,
        max_workers: usize,
        last_scale_at: Option<Instant>,
        now: Instant,
    ) -> ScaleDirective {
        let cooled_down =
            last_scale_at.map_or(true, |at| now.saturating_duration_since(at) >= self.cooldown);
        if !cooled_down {
            return ScaleDirective::Hold;
        }

        let total = snapshot.total;
        if snapshot.utilization >= self.scale_up_threshold && total < max_workers {
            ScaleDirective::Up {
                target: total + self.step(total),
            }
        } else if snapshot.utilization <= self.scale_down_threshold && total > min_workers {
            ScaleDirective::Down {
                target: total.saturating_sub(self.step(total)),
            }
        } else {
            ScaleDirective::Hold
        }
    }
}

/// Per-loop memory carried between ticks.
#[derive(Debug, Clone, Default)]
pub struct ScalerState {
    pub last_scale_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Held,
    Scaled { from: usize, to: usize },
    Stopped,
}

pub struct AutoScaler {
    manager: Arc<SwarmLifecycleManager>,
    policy: ScalePolicy,
    token: String,
    interval: Duration,
}

impl AutoScaler {
    pub fn new(
        manager: Arc<SwarmLifecycleManager>,
        policy: ScalePolicy,
        token: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            policy,
            token: token.into(),
            interval,
        }
    }

    pub fn policy(&self) -> &ScalePolicy {
        &self.policy
    }

    /// One evaluation of the control loop.
    pub async fn tick(
        &self,
        swarm_id: SwarmId,
        state: &mut ScalerState,
    ) -> Result<TickOutcome, SwarmError> {
        let report = self.manager.get_swarm_status(&self.token, swarm_id).await?;
        match report.swarm.status {
            SwarmStatus::Draining | SwarmStatus::Terminated => return Ok(TickOutcome::Stopped),
            SwarmStatus::Spawning | SwarmStatus::Scaling => return Ok(TickOutcome::Held),
            SwarmStatus::Active => {}
        }

        let snapshot = UtilizationSnapshot::from_counts(&report.counts);
        let now = Instant::now();
        let directive = self.policy.evaluate(
            snapshot,
            report.swarm.min_workers,
            report.swarm.max_workers,
            state.last_scale_at,
            now,
        );

        let target = match directive {
            ScaleDirective::Hold => return Ok(TickOutcome::Held),
            ScaleDirective::Up { target } | ScaleDirective::Down { target } => target,
        };
        debug!(
            swarm_id = %swarm_id,
            utilization = snapshot.utilization,
            ?directive,
            "Auto-scaler acting"
        );

        match self.manager.scale_swarm(&self.token, swarm_id, target).await {
            Ok(outcome) => {
                state.last_scale_at = Some(now);
                Ok(TickOutcome::Scaled {
                    from: outcome.previous,
                    to: outcome.realized,
                })
            }
            // Someone else is scaling or killing this swarm; look again next tick
            Err(SwarmError::InvalidState { .. }) => Ok(TickOutcome::Held),
            Err(e) => Err(e),
        }
    }

    /// Run the loop for one swarm until it stops.
    pub async fn run(&self, swarm_id: SwarmId) {
        let mut wakeups = self.manager.events().subscribe_swarm(swarm_id);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut state = ScalerState::default();
        info!(swarm_id = %swarm_id, "Auto-scaler loop started");

        loop {
            match self.tick(swarm_id, &mut state).await {
                Ok(TickOutcome::Stopped) | Err(SwarmError::SwarmNotFound(_)) => break,
                Ok(TickOutcome::Scaled { from, to }) => {
                    info!(swarm_id = %swarm_id, from, to, "Auto-scaled swarm");
                }
                Ok(TickOutcome::Held) => {}
                Err(e) => warn!(swarm_id = %swarm_id, "Auto-scaler tick failed: {}", e),
            }

            tokio::select! {
                _ = ticker.tick() => {}
                woke = next_wakeup(&mut wakeups) => {
                    if !woke {
                        break;
                    }
                }
            }
        }

        info!(swarm_id = %swarm_id, "Auto-scaler loop stopped");
    }

    pub fn spawn_loop(self: &Arc<Self>, swarm_id: SwarmId) -> JoinHandle<()> {
        let scaler = Arc::clone(self);
        tokio::spawn(async move { scaler.run(swarm_id).await })
    }

    /// Start a loop for every auto-scaled swarm, now and as they are spawned.
    /// Aborting the returned task aborts every loop it started.
    pub fn supervise(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Subscribe first so no spawn slips between listing and listening
            let mut events = self.manager.events().subscribe();
            let mut loops = JoinSet::new();
            let mut running: HashMap<SwarmId, AbortHandle> = HashMap::new();

            match self.manager.list_swarms(&self.token).await {
                Ok(swarms) => {
                    for swarm in swarms.into_iter().filter(|s| {
                        s.auto_scale_enabled && s.status.accepts_mutations()
                    }) {
                        self.track_loop(&mut loops, &mut running, swarm.id);
                    }
                }
                Err(e) => warn!("Auto-scaler could not list swarms: {}", e),
            }

            loop {
                match events.recv().await {
                    Ok(SwarmEvent::SwarmSpawned {
                        swarm_id,
                        auto_scale: true,
                        ..
                    }) => self.track_loop(&mut loops, &mut running, swarm_id),
                    Ok(_) | Err(EventBusError::Lagged(_)) => {}
                    Err(_) => break,
                }
            }

            loops.shutdown().await;
        })
    }

    fn track_loop(
        self: &Arc<Self>,
        loops: &mut JoinSet<()>,
        running: &mut HashMap<SwarmId, AbortHandle>,
        swarm_id: SwarmId,
    ) {
        while loops.try_join_next().is_some() {}
        running.retain(|_, handle| !handle.is_finished());
        if running.contains_key(&swarm_id) {
            return;
        }
        let scaler = Arc::clone(self);
        let handle = loops.spawn(async move { scaler.run(swarm_id).await });
        running.insert(swarm_id, handle);
    }
}

/// Wait for a utilization change or kill on the loop's swarm. `false` once the
/// bus is closed.
async fn next_wakeup(wakeups: &mut SwarmEventReceiver) -> bool {
    loop {
        match wakeups.recv().await {
            Ok(SwarmEvent::UtilizationChanged { .. }) | Ok(SwarmEvent::SwarmKilled { .. }) => {
                return true
            }
            Ok(_) => {}
            Err(EventBusError::Lagged(_)) => return true,
            Err(_) => return false,
        }
    }
}
