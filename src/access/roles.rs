//! Roles, role rows and the per-request access context

use crate::access::dashboard::DashboardKind;
use crate::errors::AuthError;
use crate::identity::Identity;
use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative roles; declaration order is priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cashier,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Cashier, Role::Admin, Role::SuperAdmin];

    pub fn priority(&self) -> u8 {
        match self {
            Role::Cashier => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// This role and every role above it
    pub fn and_above(self) -> Vec<Role> {
        Role::ALL.iter().copied().filter(|r| *r >= self).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of `user_roles`; deactivated, never deleted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleAssignment {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub is_active: bool,
    pub assigned_by: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for RoleAssignment {
    const COLLECTION: Collection = Collection::UserRoles;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Highest-priority active role among the rows
pub fn effective_role(rows: &[RoleAssignment]) -> Option<Role> {
    rows.iter().filter(|r| r.is_active).map(|r| r.role).max()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Backed by an active role row
    Assigned,
    /// Granted by the configured fallback policy
    Fallback,
}

/// Resolved effective role of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub is_active: bool,
    pub source: GrantSource,
}

impl RoleGrant {
    pub fn assigned(role: Role) -> Self {
        Self {
            role,
            is_active: true,
            source: GrantSource::Assigned,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Hierarchical: admins and super admins are cashiers too
    pub fn is_cashier(&self) -> bool {
        self.role >= Role::Cashier
    }

    pub fn can_access(&self, required: &[Role]) -> bool {
        required.contains(&self.role)
    }
}

/// Identity plus resolved grant, handed to every privileged operation
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub identity: Identity,
    pub grant: Option<RoleGrant>,
}

impl AccessContext {
    pub fn new(identity: Identity, grant: Option<RoleGrant>) -> Self {
        Self { identity, grant }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn has_any_role(&self) -> bool {
        self.grant.is_some()
    }

    pub fn dashboard(&self) -> Option<DashboardKind> {
        self.grant.as_ref().map(DashboardKind::from_grant)
    }

    /// Guard: the effective role must be one of `required`
    pub fn require(&self, required: &[Role]) -> Result<RoleGrant, AuthError> {
        let grant = self.grant.ok_or(AuthError::NoRoleAssigned)?;
        if grant.can_access(required) {
            Ok(grant)
        } else {
            Err(AuthError::Forbidden {
                required: required
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                actual: grant.role.to_string(),
            })
        }
    }

    pub fn require_at_least(&self, minimum: Role) -> Result<RoleGrant, AuthError> {
        self.require(&minimum.and_above())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: Role, active: bool) -> RoleAssignment {
        RoleAssignment {
            id: format!("{}-{}", role, active),
            user_id: "u1".to_string(),
            role,
            is_active: active,
            assigned_by: None,
            assigned_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ctx(role: Option<Role>) -> AccessContext {
        AccessContext::new(
            Identity {
                user_id: "u1".to_string(),
                phone_number: "+251911000000".to_string(),
                full_name: None,
            },
            role.map(RoleGrant::assigned),
        )
    }

    #[test]
    fn test_cashier_and_admin_resolve_to_admin() {
        let role = effective_role(&[row(Role::Cashier, true), row(Role::Admin, true)]).unwrap();
        let grant = RoleGrant::assigned(role);

        assert_eq!(grant.role, Role::Admin);
        assert!(grant.is_admin());
        assert!(grant.is_cashier());
        assert!(!grant.is_super_admin());
    }

    #[test]
    fn test_inactive_rows_are_ignored() {
        assert_eq!(
            effective_role(&[row(Role::SuperAdmin, false), row(Role::Cashier, true)]),
            Some(Role::Cashier)
        );
        assert_eq!(effective_role(&[row(Role::Admin, false)]), None);
        assert_eq!(effective_role(&[]), None);
    }

    #[test]
    fn test_priorities() {
        assert!(Role::SuperAdmin.priority() > Role::Admin.priority());
        assert!(Role::Admin.priority() > Role::Cashier.priority());
        assert_eq!(Role::Admin.and_above(), vec![Role::Admin, Role::SuperAdmin]);
    }

    #[test]
    fn test_can_access_is_membership() {
        let grant = RoleGrant::assigned(Role::SuperAdmin);
        assert!(grant.can_access(&[Role::SuperAdmin]));
        assert!(!grant.can_access(&[Role::Admin]));
    }

    #[test]
    fn test_require_guards() {
        assert!(matches!(
            ctx(None).require_at_least(Role::Cashier),
            Err(AuthError::NoRoleAssigned)
        ));
        assert!(matches!(
            ctx(Some(Role::Cashier)).require_at_least(Role::Admin),
            Err(AuthError::Forbidden { .. })
        ));
        assert!(ctx(Some(Role::Admin)).require_at_least(Role::Cashier).is_ok());
        assert!(!ctx(None).has_any_role());
    }
}
