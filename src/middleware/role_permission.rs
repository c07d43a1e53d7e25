//! Role allow-list gate

use super::{ChainState, Gate};
use crate::config::RoleConfig;
use crate::models::{Decision, GateRequest, RejectionKind, Role};
use std::collections::HashSet;

const AUTHENTICATION_REQUIRED: &str = "Authentication required to access the messaging app.";

/// Rejects anonymous users and users whose role is not allowed
#[derive(Debug, Clone)]
pub struct RolePermissionGate {
    allowed_roles: HashSet<Role>,
}

impl RolePermissionGate {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
        }
    }

    pub fn from_config(config: &RoleConfig) -> Self {
        Self::new(config.allowed_roles.iter().copied())
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

impl Default for RolePermissionGate {
    fn default() -> Self {
        Self::new([Role::Admin, Role::Host])
    }
}

impl Gate for RolePermissionGate {
    fn name(&self) -> &'static str {
        "role_permission"
    }

    fn stage(&self) -> ChainState {
        ChainState::RoleChecked
    }

    fn evaluate(&self, request: &GateRequest) -> Decision {
        let Some(user) = &request.user else {
            return Decision::reject(RejectionKind::Unauthenticated, AUTHENTICATION_REQUIRED);
        };

        if self.allows(user.role) {
            Decision::Pass
        } else {
            Decision::reject(
                RejectionKind::ForbiddenRole,
                format!(
                    "Your role ({}) does not have permission to access this resource.",
                    user.role
                ),
            )
        }
    }
}
