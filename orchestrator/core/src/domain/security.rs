// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Auth Gate Port
//!
//! Every lifecycle operation validates the caller's session token through an
//! [`AuthGate`] and checks the returned grant for the operation's
//! [`Permission`] before touching the registry.
//!
//! | Operation | Permission |
//! |-----------|------------|
//! | `spawn_swarm` | `spawn` |
//! | `scale_swarm` | `scale` |
//! | `add_agent_to_swarm` | `add-agent` |
//! | `remove_agent_from_swarm` | `remove-agent` |
//! | `kill_swarm` | `kill` |
//! | `get_swarm_status`, `list_swarms` | `read-status` |

use crate::domain::error::SwarmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    Spawn,
    Scale,
    AddAgent,
    RemoveAgent,
    Kill,
    ReadStatus,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Spawn,
        Permission::Scale,
        Permission::AddAgent,
        Permission::RemoveAgent,
        Permission::Kill,
        Permission::ReadStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Spawn => "spawn",
            Permission::Scale => "scale",
            Permission::AddAgent => "add-agent",
            Permission::RemoveAgent => "remove-agent",
            Permission::Kill => "kill",
            Permission::ReadStatus => "read-status",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s.trim())
            .copied()
            .ok_or_else(|| SwarmError::InvalidConfig(format!("unknown permission '{}'", s)))
    }
}

/// Named permission bundles assignable to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Every permission.
    Admin,
    /// Everything except `kill`.
    Operator,
    /// `read-status` only.
    Viewer,
    /// Service identity used by the auto-scaler loops.
    Autoscaler,
}

impl Role {
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Role::Admin => Permission::ALL.into_iter().collect(),
            Role::Operator => Permission::ALL
                .into_iter()
                .filter(|p| *p != Permission::Kill)
                .collect(),
            Role::Viewer => [Permission::ReadStatus].into_iter().collect(),
            Role::Autoscaler => [Permission::Scale, Permission::ReadStatus].into_iter().collect(),
        }
    }
}

/// Result of validating a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub granted: bool,
    /// Identity recorded as the `actor` of audit events.
    pub principal: String,
    pub permissions: HashSet<Permission>,
}

impl AuthGrant {
    pub fn new(principal: impl Into<String>, permissions: HashSet<Permission>) -> Self {
        Self {
            granted: true,
            principal: principal.into(),
            permissions,
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            principal: "anonymous".to_string(),
            permissions: HashSet::new(),
        }
    }

    /// Fail with `PermissionDenied` unless the grant is valid and carries `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), SwarmError> {
        if self.granted && self.permissions.contains(&permission) {
            Ok(())
        } else {
            Err(SwarmError::PermissionDenied {
                principal: self.principal.clone(),
                permission,
            })
        }
    }
}

#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Validate a session token. Unknown or expired tokens yield a denied grant.
    async fn validate(&self, token: &str) -> AuthGrant;
}
