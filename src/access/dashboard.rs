//! Role-dependent dashboards

use crate::access::roles::{Role, RoleGrant};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    Cashier,
    Admin,
    SuperAdmin,
}

impl DashboardKind {
    pub fn from_grant(grant: &RoleGrant) -> Self {
        match grant.role {
            Role::Cashier => DashboardKind::Cashier,
            Role::Admin => DashboardKind::Admin,
            Role::SuperAdmin => DashboardKind::SuperAdmin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSection {
    Overview,
    CardIssuer,
    CardVerification,
    Cartelas,
    CartelaGroups,
    GameResults,
    CreditReports,
    UserAccounts,
    RoleManagement,
    AuditLog,
}

/// Workflow sections visible to each dashboard
pub fn dashboard_sections(kind: DashboardKind) -> &'static [DashboardSection] {
    use DashboardSection::*;

    match kind {
        DashboardKind::Cashier => &[Overview, CardIssuer, CardVerification, Cartelas, CartelaGroups],
        DashboardKind::Admin => &[
            Overview,
            CardIssuer,
            CardVerification,
            Cartelas,
            CartelaGroups,
            GameResults,
            CreditReports,
            UserAccounts,
            RoleManagement,
        ],
        DashboardKind::SuperAdmin => &[
            Overview,
            CardIssuer,
            CardVerification,
            Cartelas,
            CartelaGroups,
            GameResults,
            CreditReports,
            UserAccounts,
            RoleManagement,
            AuditLog,
        ],
    }
}
