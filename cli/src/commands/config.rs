// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use swarmforge_core::domain::config::{BackendConfig, ControlPlaneConfig};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./swarmforge.yaml)
        #[arg(short, long, default_value = "./swarmforge.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ControlPlaneConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SWARMFORGE_CONFIG_PATH: {}",
            std::env::var("SWARMFORGE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./swarmforge.yaml");
        println!("  4. ~/.swarmforge/config.yaml");
        println!("  5. /etc/swarmforge/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Control plane:".bold(), config.metadata.name);
    println!();

    println!("{}", "Capacity:".bold());
    println!("  Max active swarms: {}", spec.capacity.max_active_swarms);
    println!(
        "  Agent spawn: {} attempts, backoff {:?}, timeout {:?}",
        spec.spawn.max_retries, spec.spawn.backoff_base, spec.spawn.timeout
    );
    println!(
        "  Drain timeout: {:?} (kill: {:?})",
        spec.drain.drain_timeout, spec.drain.kill_timeout
    );
    println!();

    println!("{}", "Auto-scaler:".bold());
    println!(
        "  Interval {:?}, cooldown {:?}",
        spec.autoscale.interval, spec.autoscale.cooldown
    );
    println!(
        "  Thresholds: up ≥ {:.2}, down ≤ {:.2}, step {:.0}%",
        spec.autoscale.scale_up_threshold,
        spec.autoscale.scale_down_threshold,
        spec.autoscale.step_fraction * 100.0
    );
    println!(
        "  Service token: {}",
        if spec.autoscale.service_token.is_some() {
            "configured".normal()
        } else {
            "(not set, auto-scaling disabled)".dimmed()
        }
    );
    println!();

    println!("{}", "Decision routing:".bold());
    print_backend("Local", spec.decision.local.as_ref(), spec.decision.local_timeout);
    print_backend(
        "Fallback",
        spec.decision.fallback.as_ref(),
        spec.decision.fallback_timeout,
    );
    println!("  In-flight cap: {}", spec.decision.max_in_flight);
    println!();

    println!("{}", "State:".bold());
    match &spec.state.path {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  File: {}", "(in-memory only)".dimmed()),
    }
    println!("  Terminated TTL: {:?}", spec.state.terminated_ttl);
    println!();

    println!("{}", "Auth:".bold());
    if spec.auth.tokens.is_empty() {
        println!("  {}", "No tokens configured".yellow());
    }
    for token in &spec.auth.tokens {
        println!("  {} ({:?})", token.principal.bold(), token.role);
    }
    println!();

    Ok(())
}

fn print_backend(label: &str, backend: Option<&BackendConfig>, timeout: std::time::Duration) {
    match backend {
        Some(backend) => println!(
            "  {}: {} {} → {} (timeout {:?})",
            label, backend.provider_type, backend.endpoint, backend.model, timeout
        ),
        None => println!("  {}: {}", label, "(not configured)".dimmed()),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ControlPlaneConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid_configs() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let config = ControlPlaneConfig::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarmforge.yaml");

        generate(&path, true).await.unwrap();
        validate(Some(path.clone())).await.unwrap();

        let config = ControlPlaneConfig::from_yaml_file(&path).unwrap();
        assert!(config.spec.decision.local.is_some());
    }

    #[tokio::test]
    async fn test_validate_rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            "apiVersion: swarmforge.io/v1\n\
             kind: ControlPlaneConfig\n\
             metadata:\n  name: bad\n\
             spec:\n  autoscale:\n    scale_up_threshold: 0.2\n    scale_down_threshold: 0.5\n",
        )
        .unwrap();

        assert!(validate(Some(path)).await.is_err());
    }
}
