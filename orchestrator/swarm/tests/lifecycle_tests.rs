// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the swarm lifecycle operations: spawn, add, remove,
//! scale, status and kill, including capacity enforcement, spawn retries and
//! drain semantics.

mod common;

use common::*;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_core::domain::agent::{Agent, AgentId, AgentStatus, AgentType};
use swarmforge_core::domain::coordinator::Coordinator;
use swarmforge_core::domain::error::SwarmError;
use swarmforge_core::domain::events::SwarmEvent;
use swarmforge_core::domain::health::SwarmHealth;
use swarmforge_core::domain::repository::{swarm_state_key, StateStore};
use swarmforge_core::domain::swarm::{Swarm, SwarmId, SwarmStatus};
use swarmforge_swarm::{
    LifecycleSettings, RemovalMode, SwarmHandle, SwarmState, RETAINED_DEPARTED_AGENTS,
};

#[tokio::test]
async fn test_spawn_builds_active_swarm() {
    let h = harness();
    let report = h
        .manager
        .spawn_swarm(ADMIN, spec(2, 10, &coders(2)))
        .await
        .unwrap();

    assert_eq!(report.worker_count, 2);
    assert_eq!(report.swarm.status, SwarmStatus::Active);
    assert_eq!(report.swarm.objective, "build X");
    assert_eq!(report.health, SwarmHealth::Healthy);
    assert!(report
        .agents
        .iter()
        .all(|a| a.agent_type == AgentType::GeneralistCoder && a.swarm_id() == report.swarm.id));
    assert_eq!(h.runtime.running(), 2);
    assert_eq!(h.manager.registry().active().current(), 1);

    let stored = h.store.get(&swarm_state_key(report.swarm.id)).await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_spawn_tops_up_to_min_workers_with_rotation() {
    let h = harness();
    let report = h
        .manager
        .spawn_swarm(ADMIN, spec(4, 10, &[AgentType::Researcher]))
        .await
        .unwrap();

    let types: Vec<_> = report.agents.iter().map(|a| a.agent_type).collect();
    assert_eq!(
        types,
        vec![
            AgentType::Researcher,
            AgentType::GeneralistCoder,
            AgentType::Tester,
            AgentType::Reviewer
        ]
    );
    assert_eq!(report.worker_count, 4);
}

#[tokio::test]
async fn test_spawn_rejects_invalid_config_without_consuming_capacity() {
    let h = harness();
    let cases = [
        spec(5, 3, &[]),
        spec(0, 0, &[]),
        spec(1, 2, &coders(3)),
        {
            let mut s = spec(1, 2, &[]);
            s.objective = "  ".to_string();
            s
        },
    ];
    for case in cases {
        assert!(matches!(
            h.manager.spawn_swarm(ADMIN, case).await,
            Err(SwarmError::InvalidConfig(_))
        ));
    }
    assert_eq!(h.manager.registry().active().current(), 0);
    assert!(h.manager.registry().is_empty());
}

#[tokio::test]
async fn test_eleventh_swarm_exceeds_capacity() {
    let h = harness();
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(h.spawn(1, 4, 1).await);
    }

    let err = h
        .manager
        .spawn_swarm(ADMIN, spec(1, 4, &coders(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::CapacityExceeded(_)));

    // Killing one frees a slot
    h.manager.kill_swarm(ADMIN, ids[0], "make room").await.unwrap();
    assert!(h.manager.spawn_swarm(ADMIN, spec(1, 4, &coders(1))).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spawns_never_exceed_cap() {
    let h = harness();
    let manager = Arc::clone(&h.manager);
    let attempts = (0..25).map(|_| {
        let manager = Arc::clone(&manager);
        async move { manager.spawn_swarm(ADMIN, spec(1, 3, &coders(1))).await }
    });
    let results = join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(SwarmError::CapacityExceeded(_))))
        .count();
    assert_eq!(succeeded, 10);
    assert_eq!(rejected, 15);
    assert_eq!(h.manager.registry().active().current(), 10);
}

#[tokio::test]
async fn test_permissions_are_enforced() {
    let h = harness();
    let err = h
        .manager
        .spawn_swarm(VIEWER, spec(1, 2, &coders(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::PermissionDenied { ref principal, .. } if principal == "viewer"));

    assert!(matches!(
        h.manager.spawn_swarm("forged", spec(1, 2, &coders(1))).await,
        Err(SwarmError::PermissionDenied { .. })
    ));

    let swarm_id = h.spawn(1, 4, 1).await;
    assert!(matches!(
        h.manager.kill_swarm(OPERATOR, swarm_id, "nope").await,
        Err(SwarmError::PermissionDenied { .. })
    ));
    assert!(matches!(
        h.manager.add_agent_to_swarm(SCALER, swarm_id, AgentType::Tester, 1).await,
        Err(SwarmError::PermissionDenied { .. })
    ));
    assert!(h.manager.get_swarm_status(VIEWER, swarm_id).await.is_ok());
    assert!(h.manager.scale_swarm(SCALER, swarm_id, 2).await.is_ok());
}

#[tokio::test]
async fn test_add_agents_validation_and_success() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 2).await;

    assert!(matches!(
        h.manager.add_agent_to_swarm(ADMIN, swarm_id, AgentType::Tester, 0).await,
        Err(SwarmError::InvalidConfig(_))
    ));
    assert!(matches!(
        h.manager.add_agent_to_swarm(ADMIN, swarm_id, AgentType::Tester, 3).await,
        Err(SwarmError::CapacityExceeded(_))
    ));
    assert!(matches!(
        h.manager
            .add_agent_to_swarm(ADMIN, SwarmId::new(), AgentType::Tester, 1)
            .await,
        Err(SwarmError::SwarmNotFound(_))
    ));

    let added = h
        .manager
        .add_agent_to_swarm(OPERATOR, swarm_id, AgentType::SecuritySpecialist, 2)
        .await
        .unwrap();
    assert_eq!(added.len(), 2);
    assert!(added
        .iter()
        .all(|a| a.agent_type == AgentType::SecuritySpecialist && a.status == AgentStatus::Idle));
    assert_eq!(h.worker_count(swarm_id).await, 4);
}

#[tokio::test]
async fn test_transient_spawn_failures_are_retried() {
    let h = harness();
    let swarm_id = h.spawn(0, 4, 0).await;

    h.runtime.fail_next(2);
    let added = h
        .manager
        .add_agent_to_swarm(ADMIN, swarm_id, AgentType::Planner, 1)
        .await
        .unwrap();
    assert_eq!(added[0].spawn_attempts, 3);
}

#[tokio::test]
async fn test_exhausted_spawns_are_recorded_as_failed() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 1).await;

    h.runtime.fail_always(true);
    let err = h
        .manager
        .add_agent_to_swarm(ADMIN, swarm_id, AgentType::Tester, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::SpawnFailed(_)));

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.worker_count, 1);
    assert_eq!(report.counts.failed, 2);
    // 1 idle + 2 failed: failed ratio 2/3 is critical
    assert_eq!(report.health, SwarmHealth::Critical);
    assert!(report
        .agents
        .iter()
        .filter(|a| a.status == AgentStatus::Failed)
        .all(|a| a.spawn_attempts == 4));
}

#[tokio::test]
async fn test_spawn_failure_terminates_swarm_and_releases_slot() {
    let h = harness();
    h.runtime.fail_always(true);

    let err = h
        .manager
        .spawn_swarm(ADMIN, spec(2, 4, &coders(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::SpawnFailed(_)));
    assert_eq!(h.manager.registry().active().current(), 0);

    let swarms = h.manager.list_swarms(ADMIN).await.unwrap();
    assert_eq!(swarms.len(), 1);
    assert_eq!(swarms[0].status, SwarmStatus::Terminated);
}

#[tokio::test]
async fn test_removing_last_worker_violates_min() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 1).await;
    let agent_id = h.active_agents(swarm_id).await[0];

    let err = h
        .manager
        .remove_agent_from_swarm(ADMIN, swarm_id, agent_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SwarmError::MinWorkersViolation { min_workers: 1, remaining: 0, .. }
    ));
    assert_eq!(h.worker_count(swarm_id).await, 1);
}

#[tokio::test]
async fn test_remove_idle_agent_is_immediate() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 2).await;
    let agent_id = h.active_agents(swarm_id).await[0];

    let removed = h
        .manager
        .remove_agent_from_swarm(ADMIN, swarm_id, agent_id)
        .await
        .unwrap();
    assert_eq!(removed.mode, RemovalMode::Immediate);
    assert_eq!(h.agent_status(swarm_id, agent_id).await, AgentStatus::Removed);
    assert!(h.runtime.terminated().contains(&agent_id));

    // Already removed, then never existed
    for id in [agent_id, AgentId::new()] {
        assert!(matches!(
            h.manager.remove_agent_from_swarm(ADMIN, swarm_id, id).await,
            Err(SwarmError::AgentNotFound { .. })
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn test_busy_agent_drains_gracefully() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 2).await;
    let agent_id = h.active_agents(swarm_id).await[0];
    h.mark_busy(swarm_id, agent_id).await;

    let manager = Arc::clone(&h.manager);
    let removal = tokio::spawn(async move {
        manager.remove_agent_from_swarm(ADMIN, swarm_id, agent_id).await
    });

    h.wait_until_draining(swarm_id, agent_id).await;
    assert!(h.runtime.stop_signals().contains(&agent_id));
    // Draining agents already left the active pool
    assert_eq!(h.worker_count(swarm_id).await, 1);

    h.manager
        .report_agent_status(swarm_id, agent_id, AgentStatus::Idle)
        .await
        .unwrap();

    let removed = removal.await.unwrap().unwrap();
    assert_eq!(removed.mode, RemovalMode::Drained);
    assert_eq!(h.agent_status(swarm_id, agent_id).await, AgentStatus::Removed);
}

#[tokio::test(start_paused = true)]
async fn test_busy_agent_is_forced_after_drain_timeout() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 2).await;
    let agent_id = h.active_agents(swarm_id).await[1];
    h.mark_busy(swarm_id, agent_id).await;

    let started = tokio::time::Instant::now();
    let removed = h
        .manager
        .remove_agent_from_swarm(ADMIN, swarm_id, agent_id)
        .await
        .unwrap();

    assert_eq!(removed.mode, RemovalMode::Forced);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(h.runtime.terminated().contains(&agent_id));
    assert_eq!(h.agent_status(swarm_id, agent_id).await, AgentStatus::Removed);
}

#[tokio::test]
async fn test_scale_clamps_to_bounds() {
    let h = harness();
    let swarm_id = h.spawn(2, 6, 2).await;

    let up = h.manager.scale_swarm(ADMIN, swarm_id, 6 + 5).await.unwrap();
    assert_eq!(up.target, 6);
    assert_eq!(up.realized, 6);
    assert_eq!(h.worker_count(swarm_id).await, 6);

    let down = h.manager.scale_swarm(ADMIN, swarm_id, 0).await.unwrap();
    assert_eq!(down.target, 2);
    assert_eq!(down.realized, 2);

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Active);
    assert_eq!(report.counts.removed, 4);
}

#[tokio::test]
async fn test_scale_up_uses_default_rotation() {
    let h = harness();
    let swarm_id = h.spawn(0, 10, 0).await;

    h.manager.scale_swarm(ADMIN, swarm_id, 3).await.unwrap();
    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    let types: Vec<_> = report.agents.iter().map(|a| a.agent_type).collect();
    assert_eq!(
        types,
        vec![AgentType::GeneralistCoder, AgentType::Tester, AgentType::Reviewer]
    );
}

#[tokio::test(start_paused = true)]
async fn test_scale_down_prefers_idle_agents() {
    let h = harness();
    let swarm_id = h.spawn(1, 8, 4).await;
    let agents = h.active_agents(swarm_id).await;
    h.mark_busy(swarm_id, agents[0]).await;
    h.mark_busy(swarm_id, agents[2]).await;

    let outcome = h.manager.scale_swarm(ADMIN, swarm_id, 2).await.unwrap();
    assert_eq!(outcome.realized, 2);
    // No busy agent was touched, so no drain wait happened
    assert!(h.runtime.stop_signals().is_empty());
    assert_eq!(h.agent_status(swarm_id, agents[0]).await, AgentStatus::Busy);
    assert_eq!(h.agent_status(swarm_id, agents[1]).await, AgentStatus::Removed);
    assert_eq!(h.agent_status(swarm_id, agents[2]).await, AgentStatus::Busy);
    assert_eq!(h.agent_status(swarm_id, agents[3]).await, AgentStatus::Removed);
}

#[tokio::test]
async fn test_kill_is_idempotent() {
    let h = harness();
    let mut events = h.events.subscribe();
    let swarm_id = h.spawn(1, 4, 3).await;

    let first = h.manager.kill_swarm(ADMIN, swarm_id, "objective met").await.unwrap();
    assert!(!first.already_terminated);
    assert_eq!(first.graceful_removals, 3);
    assert_eq!(first.forced_removals, 0);

    let second = h.manager.kill_swarm(ADMIN, swarm_id, "again").await.unwrap();
    assert!(second.already_terminated);

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Terminated);
    assert!(report.swarm.ended_at.is_some());
    assert_eq!(report.worker_count, 0);
    assert_eq!(h.manager.registry().active().current(), 0);
    assert_eq!(h.runtime.running(), 0);

    let mut kills = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SwarmEvent::SwarmKilled { reason, .. } = event {
            kills.push(reason);
        }
    }
    assert_eq!(kills, vec!["objective met".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_kill_forces_busy_agents_after_kill_timeout() {
    let h = HarnessBuilder::new()
        .settings(LifecycleSettings {
            kill_timeout: Duration::from_secs(5),
            ..fast_settings()
        })
        .build();
    let swarm_id = h.spawn(1, 4, 3).await;
    let agents = h.active_agents(swarm_id).await;
    h.mark_busy(swarm_id, agents[0]).await;
    h.mark_busy(swarm_id, agents[1]).await;

    let started = tokio::time::Instant::now();
    let outcome = h.manager.kill_swarm(ADMIN, swarm_id, "shutdown").await.unwrap();
    assert_eq!(outcome.graceful_removals, 1);
    assert_eq!(outcome.forced_removals, 2);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_mutations_on_terminated_swarm_are_rejected() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 2).await;
    let agent_id = h.active_agents(swarm_id).await[0];
    h.manager.kill_swarm(ADMIN, swarm_id, "done").await.unwrap();

    assert!(matches!(
        h.manager.add_agent_to_swarm(ADMIN, swarm_id, AgentType::Tester, 1).await,
        Err(SwarmError::InvalidState { status: SwarmStatus::Terminated, .. })
    ));
    assert!(matches!(
        h.manager.scale_swarm(ADMIN, swarm_id, 3).await,
        Err(SwarmError::InvalidState { .. })
    ));
    assert!(matches!(
        h.manager.remove_agent_from_swarm(ADMIN, swarm_id, agent_id).await,
        Err(SwarmError::InvalidState { .. })
    ));
    assert!(matches!(
        h.manager.get_swarm_status(ADMIN, SwarmId::new()).await,
        Err(SwarmError::SwarmNotFound(_))
    ));
}

#[tokio::test]
async fn test_worker_bounds_hold_across_operation_sequence() {
    let h = harness();
    let swarm_id = h.spawn(2, 5, 3).await;
    let targets = [9, 0, 4, 1, 5, 3, 7, 2];

    for (step, target) in targets.into_iter().enumerate() {
        h.manager.scale_swarm(OPERATOR, swarm_id, target).await.unwrap();
        if step % 2 == 0 {
            let _ = h
                .manager
                .add_agent_to_swarm(OPERATOR, swarm_id, AgentType::Tester, 1)
                .await;
        } else if let Some(agent_id) = h.active_agents(swarm_id).await.first().copied() {
            let _ = h
                .manager
                .remove_agent_from_swarm(OPERATOR, swarm_id, agent_id)
                .await;
        }

        let count = h.worker_count(swarm_id).await;
        assert!((2..=5).contains(&count), "step {step}: worker_count {count}");
    }
}

#[tokio::test]
async fn test_report_agent_status_updates_utilization() {
    let h = harness();
    let swarm_id = h.spawn(1, 4, 4).await;
    let agents = h.active_agents(swarm_id).await;

    for agent_id in &agents[..3] {
        h.mark_busy(swarm_id, *agent_id).await;
    }
    let snapshot = h
        .manager
        .report_agent_status(swarm_id, agents[3], AgentStatus::Busy)
        .await
        .unwrap();
    assert_eq!(snapshot.busy, 4);
    assert_eq!(snapshot.utilization, 1.0);

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.health, SwarmHealth::Degraded);

    assert!(matches!(
        h.manager
            .report_agent_status(swarm_id, agents[0], AgentStatus::Removed)
            .await,
        Err(SwarmError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_state_store_failures_do_not_fail_operations() {
    let h = HarnessBuilder::new().store(Arc::new(BrokenStore)).build();
    let swarm_id = h.spawn(1, 4, 2).await;

    h.manager.scale_swarm(ADMIN, swarm_id, 4).await.unwrap();
    h.manager.kill_swarm(ADMIN, swarm_id, "done").await.unwrap();
    assert!(h.manager.restore().await.is_err());
}

#[tokio::test]
async fn test_list_swarms_orders_by_creation() {
    let h = harness();
    let first = h.spawn(1, 2, 1).await;
    let second = h.spawn(1, 2, 1).await;

    let listed: Vec<_> = h
        .manager
        .list_swarms(VIEWER)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, vec![first, second]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_spawn_gives_back_its_slot() {
    let h = HarnessBuilder::new()
        .settings(LifecycleSettings {
            spawn_backoff_base: Duration::from_millis(200),
            ..fast_settings()
        })
        .build();
    h.runtime.fail_always(true);

    let attempt = tokio::time::timeout(
        Duration::from_millis(100),
        h.manager.spawn_swarm(ADMIN, spec(1, 4, &coders(2))),
    )
    .await;
    assert!(attempt.is_err(), "spawn should still be retrying");

    // The abandoned swarm is retired on a background task
    for _ in 0..100 {
        if h.manager.registry().active().current() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.manager.registry().active().current(), 0);

    let swarms = h.manager.list_swarms(ADMIN).await.unwrap();
    assert_eq!(swarms.len(), 1);
    assert_eq!(swarms[0].status, SwarmStatus::Terminated);
    let killed = h
        .manager
        .kill_swarm(ADMIN, swarms[0].id, "cleanup")
        .await
        .unwrap();
    assert!(killed.already_terminated);

    h.runtime.fail_always(false);
    for _ in 0..10 {
        h.spawn(1, 2, 1).await;
    }
    assert_eq!(h.manager.registry().active().current(), 10);
}

#[tokio::test]
async fn test_kill_retires_spawning_swarm() {
    let h = harness();
    let swarm = Swarm::new(&spec(1, 4, &[]));
    let swarm_id = swarm.id;
    let mut state = SwarmState::new(swarm);
    let agent = Agent::new(swarm_id, AgentType::Tester);
    let agent_id = agent.id;
    state.agents.push(agent);
    assert!(h.manager.registry().active().try_reserve());
    h.manager.registry().insert(Arc::new(SwarmHandle::new(
        state,
        Arc::new(Coordinator::new(swarm_id, 4)),
    )));

    let outcome = h.manager.kill_swarm(ADMIN, swarm_id, "abort").await.unwrap();
    assert!(!outcome.already_terminated);
    assert_eq!(outcome.graceful_removals, 1);
    assert_eq!(outcome.forced_removals, 0);

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Terminated);
    assert_eq!(h.agent_status(swarm_id, agent_id).await, AgentStatus::Removed);
    assert!(h.runtime.terminated().contains(&agent_id));
    assert_eq!(h.manager.registry().active().current(), 0);
}

#[tokio::test]
async fn test_scale_cycles_keep_agent_history_bounded() {
    let h = harness();
    let swarm_id = h.spawn(1, 10, 1).await;

    for _ in 0..50 {
        h.manager.scale_swarm(ADMIN, swarm_id, 10).await.unwrap();
        h.manager.scale_swarm(ADMIN, swarm_id, 1).await.unwrap();
    }

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.worker_count, 1);
    assert_eq!(report.counts.removed, RETAINED_DEPARTED_AGENTS);
    assert_eq!(report.agents.len(), 1 + RETAINED_DEPARTED_AGENTS);

    let stored = h.store.get(&swarm_state_key(swarm_id)).await.unwrap().unwrap();
    assert_eq!(
        stored["agents"].as_array().unwrap().len(),
        1 + RETAINED_DEPARTED_AGENTS
    );
}

#[tokio::test(start_paused = true)]
async fn test_kill_during_scale_down_drain_terminates_swarm() {
    // The kill deadline falls inside the scale's drain wait
    let h = HarnessBuilder::new()
        .settings(LifecycleSettings {
            kill_timeout: Duration::from_secs(5),
            ..fast_settings()
        })
        .build();
    let swarm_id = h.spawn(1, 6, 4).await;
    let agents = h.active_agents(swarm_id).await;
    for agent_id in &agents {
        h.mark_busy(swarm_id, *agent_id).await;
    }

    let manager = Arc::clone(&h.manager);
    let scale = tokio::spawn(async move { manager.scale_swarm(ADMIN, swarm_id, 1).await });
    h.wait_until_draining(swarm_id, agents[0]).await;
    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Scaling);

    let killed = h.manager.kill_swarm(ADMIN, swarm_id, "abort").await.unwrap();
    assert_eq!(killed.graceful_removals + killed.forced_removals, 4);

    let scaled = scale.await.unwrap().unwrap();
    assert_eq!(scaled.realized, 0);

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Terminated);
    assert_eq!(report.worker_count, 0);
    assert!(agents
        .iter()
        .all(|id| report.agents.iter().any(|a| a.id == *id && a.status == AgentStatus::Removed)));
    assert_eq!(h.manager.registry().active().current(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_scales_stay_within_bounds() {
    let h = harness();
    let swarm_id = h.spawn(2, 6, 4).await;
    let agents = h.active_agents(swarm_id).await;
    h.mark_busy(swarm_id, agents[0]).await;

    let tasks = [0, 9, 3, 1, 6, 5, 2, 8].map(|target| {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.scale_swarm(ADMIN, swarm_id, target).await })
    });
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(outcome) => assert!((2..=6).contains(&outcome.realized)),
            Err(SwarmError::InvalidState { status, .. }) => {
                assert_eq!(status, SwarmStatus::Scaling)
            }
            Err(e) => panic!("unexpected scale error: {}", e),
        }
    }

    let report = h.manager.get_swarm_status(ADMIN, swarm_id).await.unwrap();
    assert_eq!(report.swarm.status, SwarmStatus::Active);
    assert!((2..=6).contains(&report.worker_count));

    h.manager.kill_swarm(ADMIN, swarm_id, "done").await.unwrap();
    assert_eq!(h.manager.registry().active().current(), 0);
}
