// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm lifecycle commands
//!
//! Commands: spawn, add, remove, scale, status, kill, list, decide, report-status, run

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use swarmforge_core::domain::{
    agent::{AgentId, AgentStatus, AgentType},
    health::{SwarmHealth, SwarmStatusReport},
    swarm::{QueenType, SwarmId, SwarmSpec, SwarmStatus, Topology},
};
use swarmforge_swarm::{RemovalMode, SwarmSummary};

use crate::control_plane::ControlPlane;

#[derive(Subcommand)]
pub enum SwarmCommand {
    /// Spawn a new swarm
    Spawn {
        /// What the swarm works toward
        #[arg(value_name = "OBJECTIVE")]
        objective: String,

        /// hierarchical, mesh or adaptive
        #[arg(long, default_value = "hierarchical")]
        topology: Topology,

        /// strategic or adaptive
        #[arg(long, default_value = "strategic")]
        queen: QueenType,

        #[arg(long, default_value_t = 1)]
        min_workers: usize,

        #[arg(long, default_value_t = 8)]
        max_workers: usize,

        /// Initial agent types (repeat the flag or separate with commas)
        #[arg(long = "agent", value_name = "TYPE", value_delimiter = ',')]
        agents: Vec<AgentType>,

        /// Let the auto-scaler manage the worker count
        #[arg(long)]
        auto_scale: bool,
    },

    /// Add agents of one type to a swarm
    Add {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(value_name = "TYPE")]
        agent_type: AgentType,

        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Remove one agent, draining it first when busy
    Remove {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(value_name = "AGENT_ID", value_parser = parse_agent_id)]
        agent_id: AgentId,
    },

    /// Scale a swarm to a target worker count (clamped to its bounds)
    Scale {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(value_name = "TARGET")]
        target: usize,
    },

    /// Show swarm status
    Status {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        /// Include the agent table
        #[arg(long)]
        agents: bool,
    },

    /// Drain and terminate a swarm
    Kill {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(long, default_value = "operator request")]
        reason: String,
    },

    /// List swarms
    List,

    /// Ask a swarm's coordinator for a decision
    Decide {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Override the local backend timeout
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Report an agent busy or idle (task executor hook)
    ReportStatus {
        #[arg(value_name = "SWARM_ID", value_parser = parse_swarm_id)]
        swarm_id: SwarmId,

        #[arg(value_name = "AGENT_ID", value_parser = parse_agent_id)]
        agent_id: AgentId,

        /// busy or idle
        #[arg(value_name = "STATUS")]
        status: AgentStatus,
    },

    /// Run the control plane in the foreground with auto-scaling until Ctrl-C
    Run,
}

/// Flags shared by every swarm command.
pub struct CommandContext {
    pub config_path: Option<PathBuf>,
    pub token: Option<String>,
    pub json: bool,
}

impl CommandContext {
    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("No session token given; pass --token or set SWARMFORGE_TOKEN")
    }
}

pub fn parse_swarm_id(s: &str) -> Result<SwarmId, String> {
    SwarmId::from_string(s).map_err(|e| format!("invalid swarm id '{}': {}", s, e))
}

pub fn parse_agent_id(s: &str) -> Result<AgentId, String> {
    AgentId::from_string(s).map_err(|e| format!("invalid agent id '{}': {}", s, e))
}

pub async fn handle_command(command: SwarmCommand, ctx: CommandContext) -> Result<()> {
    let plane = ControlPlane::load(ctx.config_path.clone()).await?;
    let result = execute(command, &plane, &ctx).await;
    plane.shutdown().await;
    result
}

async fn execute(command: SwarmCommand, plane: &ControlPlane, ctx: &CommandContext) -> Result<()> {
    let manager = plane.manager();

    match command {
        SwarmCommand::Spawn {
            objective,
            topology,
            queen,
            min_workers,
            max_workers,
            agents,
            auto_scale,
        } => {
            let spec = SwarmSpec {
                objective,
                topology,
                queen_type: queen,
                min_workers,
                max_workers,
                initial_agents: agents,
                auto_scale,
            };
            let report = manager.spawn_swarm(ctx.token()?, spec).await?;
            if ctx.json {
                return print_json(&report);
            }
            println!(
                "{}",
                format!("✓ Swarm spawned: {}", report.swarm.id).green()
            );
            print_report(&report, false);
        }

        SwarmCommand::Add {
            swarm_id,
            agent_type,
            count,
        } => {
            let added = manager
                .add_agent_to_swarm(ctx.token()?, swarm_id, agent_type, count)
                .await?;
            if ctx.json {
                return print_json(&added);
            }
            println!(
                "{}",
                format!("✓ Added {} {} agent(s)", added.len(), agent_type).green()
            );
            for agent in &added {
                println!("  {}", agent.id);
            }
        }

        SwarmCommand::Remove { swarm_id, agent_id } => {
            let removed = manager
                .remove_agent_from_swarm(ctx.token()?, swarm_id, agent_id)
                .await?;
            if ctx.json {
                return print_json(&removed);
            }
            let how = match removed.mode {
                RemovalMode::Immediate => "removed".green(),
                RemovalMode::Drained => "drained and removed".green(),
                RemovalMode::Forced => "force-terminated after drain timeout".yellow(),
            };
            println!("✓ Agent {} {}", removed.agent_id, how);
        }

        SwarmCommand::Scale { swarm_id, target } => {
            let outcome = manager.scale_swarm(ctx.token()?, swarm_id, target).await?;
            if ctx.json {
                return print_json(&outcome);
            }
            println!(
                "{}",
                format!("✓ Scaled {} → {} workers", outcome.previous, outcome.realized).green()
            );
            if outcome.target != outcome.requested {
                println!(
                    "{}",
                    format!(
                        "  requested {} clamped to {}",
                        outcome.requested, outcome.target
                    )
                    .dimmed()
                );
            }
        }

        SwarmCommand::Status { swarm_id, agents } => {
            let report = manager.get_swarm_status(ctx.token()?, swarm_id).await?;
            if ctx.json {
                return print_json(&report);
            }
            print_report(&report, agents);
        }

        SwarmCommand::Kill { swarm_id, reason } => {
            let outcome = manager.kill_swarm(ctx.token()?, swarm_id, &reason).await?;
            if ctx.json {
                return print_json(&outcome);
            }
            if outcome.already_terminated {
                println!("{}", format!("Swarm {} already terminated", swarm_id).yellow());
            } else {
                println!("{}", format!("✓ Swarm {} terminated", swarm_id).green());
                println!(
                    "  graceful: {}  forced: {}",
                    outcome.graceful_removals, outcome.forced_removals
                );
            }
        }

        SwarmCommand::List => {
            let swarms = manager.list_swarms(ctx.token()?).await?;
            if ctx.json {
                return print_json(&swarms);
            }
            print_summaries(&swarms);
        }

        SwarmCommand::Decide {
            swarm_id,
            prompt,
            timeout_ms,
        } => {
            let decision = manager
                .query_decision(swarm_id, &prompt, timeout_ms.map(Duration::from_millis))
                .await?;
            if ctx.json {
                return print_json(&decision);
            }
            println!(
                "{} {}",
                format!("[{}]", decision.source).cyan(),
                decision.text
            );
            println!(
                "{}",
                format!(
                    "confidence {:.2}, {} ms",
                    decision.confidence, decision.latency_ms
                )
                .dimmed()
            );
        }

        SwarmCommand::ReportStatus {
            swarm_id,
            agent_id,
            status,
        } => {
            let snapshot = manager
                .report_agent_status(swarm_id, agent_id, status)
                .await?;
            if ctx.json {
                return print_json(&snapshot);
            }
            println!(
                "Utilization: {:.0}% ({}/{} busy)",
                snapshot.utilization * 100.0,
                snapshot.busy,
                snapshot.total
            );
        }

        SwarmCommand::Run => run_foreground(plane).await?,
    }

    Ok(())
}

async fn run_foreground(plane: &ControlPlane) -> Result<()> {
    let supervisor = match plane.autoscaler()? {
        Some(scaler) => Some(scaler.supervise()),
        None => {
            println!(
                "{}",
                "No autoscale.service_token configured; auto-scaling is disabled".yellow()
            );
            None
        }
    };

    info!("Control plane running, press Ctrl-C to stop");
    println!("{}", "Control plane running. Press Ctrl-C to stop.".green());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    if let Some(supervisor) = supervisor {
        supervisor.abort();
        let _ = supervisor.await;
    }
    info!("Control plane stopping");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn colored_status(status: SwarmStatus) -> colored::ColoredString {
    let s = status.to_string();
    match status {
        SwarmStatus::Active => s.green(),
        SwarmStatus::Spawning | SwarmStatus::Scaling => s.cyan(),
        SwarmStatus::Draining => s.yellow(),
        SwarmStatus::Terminated => s.dimmed(),
    }
}

fn colored_health(health: SwarmHealth) -> colored::ColoredString {
    let s = health.to_string();
    match health {
        SwarmHealth::Healthy => s.green(),
        SwarmHealth::Degraded => s.yellow(),
        SwarmHealth::Critical => s.red(),
    }
}

fn print_report(report: &SwarmStatusReport, with_agents: bool) {
    let swarm = &report.swarm;
    println!("{}", "Swarm:".bold());
    println!("  ID: {}", swarm.id);
    println!("  Objective: {}", swarm.objective);
    println!("  Topology: {} / queen {}", swarm.topology, swarm.queen_type);
    println!("  Status: {}", colored_status(swarm.status));
    println!("  Health: {}", colored_health(report.health));
    println!(
        "  Workers: {} (min {}, max {}){}",
        report.worker_count,
        swarm.min_workers,
        swarm.max_workers,
        if swarm.auto_scale_enabled { ", auto-scaled" } else { "" }
    );
    println!(
        "  Utilization: {:.0}% (idle {}, busy {}, draining {}, failed {})",
        report.utilization * 100.0,
        report.counts.idle,
        report.counts.busy,
        report.counts.draining,
        report.counts.failed
    );
    println!(
        "  Decisions: last source {}, {} pending",
        report.decision_source, report.pending_decisions
    );

    if with_agents {
        println!();
        println!("{:<38} {:<26} {}", "AGENT", "TYPE", "STATUS");
        for agent in &report.agents {
            println!(
                "{:<38} {:<26} {}",
                agent.id,
                agent.agent_type.to_string(),
                agent.status
            );
        }
    }
}

fn print_summaries(swarms: &[SwarmSummary]) {
    if swarms.is_empty() {
        println!("{}", "No swarms found".yellow());
        return;
    }

    println!("{} swarms found:", swarms.len());
    println!(
        "{:<38} {:<12} {:<10} {:<9} {}",
        "ID", "STATUS", "HEALTH", "WORKERS", "OBJECTIVE"
    );
    for swarm in swarms {
        println!(
            "{:<38} {:<12} {:<10} {:<9} {}",
            swarm.id,
            colored_status(swarm.status),
            colored_health(swarm.health),
            format!("{}/{}", swarm.worker_count, swarm.max_workers),
            swarm.objective.bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: SwarmCommand,
    }

    #[test]
    fn test_spawn_parses_agent_list() {
        let cli = TestCli::try_parse_from([
            "swarmforge",
            "spawn",
            "build X",
            "--min-workers",
            "2",
            "--max-workers",
            "10",
            "--agent",
            "coder,tester",
            "--agent",
            "architect",
        ])
        .unwrap();

        match cli.command {
            SwarmCommand::Spawn {
                objective,
                topology,
                queen,
                agents,
                min_workers,
                max_workers,
                auto_scale,
            } => {
                assert_eq!(objective, "build X");
                assert_eq!(topology, Topology::Hierarchical);
                assert_eq!(queen, QueenType::Strategic);
                assert_eq!((min_workers, max_workers), (2, 10));
                assert_eq!(
                    agents,
                    vec![
                        AgentType::GeneralistCoder,
                        AgentType::Tester,
                        AgentType::ArchitectureSpecialist
                    ]
                );
                assert!(!auto_scale);
            }
            _ => panic!("expected spawn"),
        }
    }

    #[test]
    fn test_unknown_agent_type_is_rejected() {
        let swarm_id = SwarmId::new().to_string();
        assert!(TestCli::try_parse_from(["swarmforge", "add", swarm_id.as_str(), "astronaut"]).is_err());
    }

    #[test]
    fn test_malformed_swarm_id_is_rejected() {
        assert!(TestCli::try_parse_from(["swarmforge", "status", "not-a-uuid"]).is_err());
        assert!(parse_swarm_id(&SwarmId::new().to_string()).is_ok());
    }

    #[test]
    fn test_missing_token_is_reported() {
        let ctx = CommandContext {
            config_path: None,
            token: None,
            json: false,
        };
        assert!(ctx.token().unwrap_err().to_string().contains("SWARMFORGE_TOKEN"));
    }
}
