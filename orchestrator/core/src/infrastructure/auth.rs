// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Static Token Auth Gate
//!
//! Resolves session tokens against the `auth.tokens` list of the control plane
//! configuration. Token comparison is constant-time.

use crate::domain::config::AuthConfig;
use crate::domain::security::{AuthGate, AuthGrant, Role};
use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct TokenEntry {
    token: String,
    principal: String,
    role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthGate {
    entries: Vec<TokenEntry>,
}

impl StaticTokenAuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, resolving `env:` token references.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let mut gate = Self::new();
        for entry in &config.tokens {
            let token = entry.resolve_token()?;
            gate = gate.with_token(token, entry.principal.clone(), entry.role);
        }
        if gate.entries.is_empty() {
            warn!("No auth tokens configured; every lifecycle operation will be denied");
        }
        Ok(gate)
    }

    pub fn with_token(
        mut self,
        token: impl Into<String>,
        principal: impl Into<String>,
        role: Role,
    ) -> Self {
        self.entries.push(TokenEntry {
            token: token.into(),
            principal: principal.into(),
            role,
        });
        self
    }
}

#[async_trait]
impl AuthGate for StaticTokenAuthGate {
    async fn validate(&self, token: &str) -> AuthGrant {
        // Scan every entry so timing does not reveal the match position
        let mut matched: Option<&TokenEntry> = None;
        for entry in &self.entries {
            if bool::from(entry.token.as_bytes().ct_eq(token.as_bytes())) && matched.is_none() {
                matched = Some(entry);
            }
        }

        match matched {
            Some(entry) => {
                debug!(principal = %entry.principal, "Session token accepted");
                AuthGrant::new(entry.principal.clone(), entry.role.permissions())
            }
            None => {
                debug!("Session token rejected");
                AuthGrant::denied()
            }
        }
    }
}
