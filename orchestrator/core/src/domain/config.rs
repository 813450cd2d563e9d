// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Control Plane Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Global capacity (active swarm cap)
// - Agent spawn retry/backoff and drain/kill timeouts
// - Auto-scaler policy
// - Decision routing timeouts and reasoning backends
// - State store location and retention
// - Static session tokens for the auth gate
//
// Durations use humantime notation ("200ms", "30s", "24h").

use crate::domain::security::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "swarmforge.io/v1";
pub const KIND: &str = "ControlPlaneConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ControlPlaneSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlPlaneSpec {
    #[serde(default)]
    pub capacity: CapacityConfig,

    #[serde(default)]
    pub spawn: SpawnConfig,

    #[serde(default)]
    pub drain: DrainConfig,

    #[serde(default)]
    pub autoscale: AutoScaleConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Swarms allowed in spawning/active/scaling at once
    #[serde(default = "default_max_active_swarms")]
    pub max_active_swarms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Retries after the first failed attempt
    #[serde(default = "default_spawn_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    #[serde(with = "humantime_serde", default = "default_backoff_base")]
    pub backoff_base: Duration,

    /// Upper bound for a single spawn attempt
    #[serde(with = "humantime_serde", default = "default_spawn_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// How long a busy agent may take to finish before it is force-removed
    #[serde(with = "humantime_serde", default = "default_drain_timeout")]
    pub drain_timeout: Duration,

    /// Shared deadline for draining every agent of a killed swarm
    #[serde(with = "humantime_serde", default = "default_drain_timeout")]
    pub kill_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScaleConfig {
    #[serde(with = "humantime_serde", default = "default_autoscale_interval")]
    pub interval: Duration,

    /// Minimum time between two scale actions on the same swarm
    #[serde(with = "humantime_serde", default = "default_cooldown")]
    pub cooldown: Duration,

    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: f64,

    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: f64,

    /// Fraction of the current worker count added/removed per action
    #[serde(default = "default_step_fraction")]
    pub step_fraction: f64,

    /// Session token the auto-scaler presents to the auth gate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(with = "humantime_serde", default = "default_local_timeout")]
    pub local_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_fallback_timeout")]
    pub fallback_timeout: Duration,

    /// In-flight decision requests allowed per swarm
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<BackendConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// "ollama" or "openai-compatible"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    pub model: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Resolve the API key, following "env:VAR_NAME" indirection
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        match &self.api_key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// JSON state file. In-memory only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Retention of terminated swarm records
    #[serde(with = "humantime_serde", default = "default_terminated_ttl")]
    pub terminated_ttl: Duration,

    /// Upper bound for a single snapshot write
    #[serde(with = "humantime_serde", default = "default_write_timeout")]
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token value (supports "env:VAR_NAME")
    pub token: String,

    /// Identity recorded in audit events
    pub principal: String,

    pub role: Role,
}

impl TokenConfig {
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        match self.token.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(self.token.clone()),
        }
    }
}

// Default value functions
fn default_max_active_swarms() -> usize {
    10
}

fn default_spawn_retries() -> u32 {
    3
}

fn default_backoff_base() -> Duration {
    Duration::from_millis(200)
}

fn default_spawn_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_autoscale_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_scale_up_threshold() -> f64 {
    0.8
}

fn default_scale_down_threshold() -> f64 {
    0.3
}

fn default_step_fraction() -> f64 {
    0.25
}

fn default_local_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_fallback_timeout() -> Duration {
    Duration::from_millis(15000)
}

fn default_max_in_flight() -> usize {
    5
}

fn default_terminated_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_active_swarms: default_max_active_swarms(),
        }
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_retries: default_spawn_retries(),
            backoff_base: default_backoff_base(),
            timeout: default_spawn_timeout(),
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
            kill_timeout: default_drain_timeout(),
        }
    }
}

impl Default for AutoScaleConfig {
    fn default() -> Self {
        Self {
            interval: default_autoscale_interval(),
            cooldown: default_cooldown(),
            scale_up_threshold: default_scale_up_threshold(),
            scale_down_threshold: default_scale_down_threshold(),
            step_fraction: default_step_fraction(),
            service_token: None,
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            local_timeout: default_local_timeout(),
            fallback_timeout: default_fallback_timeout(),
            max_in_flight: default_max_in_flight(),
            local: None,
            fallback: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: None,
            terminated_ttl: default_terminated_ttl(),
            write_timeout: default_write_timeout(),
        }
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "swarmforge".to_string(),
                labels: None,
            },
            spec: ControlPlaneSpec::default(),
        }
    }
}

impl ControlPlaneConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. SWARMFORGE_CONFIG_PATH environment variable
    /// 2. ./swarmforge.yaml (working directory)
    /// 3. ~/.swarmforge/config.yaml (user home)
    /// 4. /etc/swarmforge/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWARMFORGE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./swarmforge.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".swarmforge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/swarmforge/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load from an explicit path (must exist), else discovery, else defaults
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides (container deployments)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SWARMFORGE_MAX_ACTIVE_SWARMS") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: SWARMFORGE_MAX_ACTIVE_SWARMS={}", n);
                    self.spec.capacity.max_active_swarms = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for SWARMFORGE_MAX_ACTIVE_SWARMS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("SWARMFORGE_DRAIN_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: SWARMFORGE_DRAIN_TIMEOUT_SECS={}", secs);
                    self.spec.drain.drain_timeout = Duration::from_secs(secs);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for SWARMFORGE_DRAIN_TIMEOUT_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(path) = std::env::var("SWARMFORGE_STATE_PATH") {
            tracing::info!("Environment override: SWARMFORGE_STATE_PATH={}", path);
            self.spec.state.path = Some(PathBuf::from(path));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.capacity.max_active_swarms == 0 {
            anyhow::bail!("capacity.max_active_swarms must be at least 1");
        }

        let scale = &self.spec.autoscale;
        for (name, value) in [
            ("scale_up_threshold", scale.scale_up_threshold),
            ("scale_down_threshold", scale.scale_down_threshold),
            ("step_fraction", scale.step_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("autoscale.{} must be within [0, 1], got {}", name, value);
            }
        }
        if scale.scale_down_threshold >= scale.scale_up_threshold {
            anyhow::bail!(
                "autoscale.scale_down_threshold ({}) must be below scale_up_threshold ({})",
                scale.scale_down_threshold,
                scale.scale_up_threshold
            );
        }

        if self.spec.decision.max_in_flight == 0 {
            anyhow::bail!("decision.max_in_flight must be at least 1");
        }

        for (slot, backend) in [
            ("local", &self.spec.decision.local),
            ("fallback", &self.spec.decision.fallback),
        ] {
            if let Some(backend) = backend {
                if backend.endpoint.is_empty() {
                    anyhow::bail!("decision.{} endpoint cannot be empty", slot);
                }
                if backend.model.is_empty() {
                    anyhow::bail!("decision.{} model cannot be empty", slot);
                }
                if !matches!(backend.provider_type.as_str(), "ollama" | "openai-compatible") {
                    anyhow::bail!(
                        "decision.{} type '{}' is not supported",
                        slot,
                        backend.provider_type
                    );
                }
            }
        }

        for token in &self.spec.auth.tokens {
            if token.token.is_empty() {
                anyhow::bail!("auth token for '{}' cannot be empty", token.principal);
            }
            if token.principal.is_empty() {
                anyhow::bail!("auth token principal cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.capacity.max_active_swarms, 10);
        assert_eq!(config.spec.spawn.max_retries, 3);
        assert_eq!(config.spec.spawn.backoff_base, Duration::from_millis(200));
        assert_eq!(config.spec.drain.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.spec.autoscale.cooldown, Duration::from_secs(60));
        assert_eq!(config.spec.decision.local_timeout, Duration::from_millis(5000));
        assert_eq!(config.spec.decision.fallback_timeout, Duration::from_millis(15000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_humantime_durations() {
        let yaml = r#"
apiVersion: swarmforge.io/v1
kind: ControlPlaneConfig
metadata:
  name: test-plane
spec:
  capacity:
    max_active_swarms: 4
  drain:
    drain_timeout: 5s
    kill_timeout: 1m
  autoscale:
    cooldown: 90s
    service_token: scaler-token
  decision:
    local:
      type: ollama
      endpoint: http://localhost:11434
      model: llama3.2
  auth:
    tokens:
      - token: admin-token
        principal: ops
        role: admin
"#;
        let config = ControlPlaneConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.spec.capacity.max_active_swarms, 4);
        assert_eq!(config.spec.drain.drain_timeout, Duration::from_secs(5));
        assert_eq!(config.spec.drain.kill_timeout, Duration::from_secs(60));
        assert_eq!(config.spec.autoscale.cooldown, Duration::from_secs(90));
        // Untouched sections keep their defaults
        assert_eq!(config.spec.spawn.max_retries, 3);
        assert_eq!(config.spec.auth.tokens[0].role, Role::Admin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = ControlPlaneConfig::default();
        assert!(config.validate().is_ok());

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.spec.autoscale.scale_down_threshold = 0.9;
        assert!(config.validate().is_err());
        config.spec.autoscale.scale_down_threshold = 0.3;

        config.spec.decision.fallback = Some(BackendConfig {
            provider_type: "carrier-pigeon".to_string(),
            endpoint: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ControlPlaneConfig::default();
        let yaml = config.to_yaml_string().unwrap();
        let parsed = ControlPlaneConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.state.terminated_ttl, config.spec.state.terminated_ttl);
        assert_eq!(parsed.metadata.name, "swarmforge");
    }
}
