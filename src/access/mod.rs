//! Role-based access: roles, the resolver and dashboards

pub mod dashboard;
pub mod resolver;
pub mod roles;

pub use dashboard::{dashboard_sections, DashboardKind, DashboardSection};
pub use resolver::RoleResolver;
pub use roles::{AccessContext, GrantSource, Role, RoleAssignment, RoleGrant};
