//! Effective-role resolution and role management
//!
//! A single resolver backs both the route guard and the "has any role"
//! check, so the two always agree. Grants are cached per user and dropped
//! on sign-in, sign-out, explicit refresh and any role mutation for that
//! user.

use crate::access::roles::{
    effective_role, AccessContext, GrantSource, Role, RoleAssignment, RoleGrant,
};
use crate::admin::audit::AdminAction;
use crate::config::{AccessConfig, FallbackPolicy};
use crate::errors::{AuthError, BingoError, BingoResult};
use crate::identity::Identity;
use crate::metrics::Metrics;
use crate::store::{fetch, procedures, select, Collection, Order, Query, SharedStore, WriteBatch};
use crate::wallet::types::AgentProfile;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FALLBACK_FULL_NAME: &str = "Staff User";

pub struct RoleResolver {
    store: SharedStore,
    config: AccessConfig,
    currency: String,
    cache: DashMap<String, Option<RoleGrant>>,
    metrics: Option<Arc<Metrics>>,
}

impl RoleResolver {
    pub fn new(store: SharedStore, config: AccessConfig, currency: impl Into<String>) -> Self {
        Self {
            store,
            config,
            currency: currency.into(),
            cache: DashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.config.fallback_policy
    }

    /// Effective grant for `identity`, or `None` when the fallback policy denies
    pub async fn resolve(&self, identity: &Identity) -> BingoResult<Option<RoleGrant>> {
        if let Some(cached) = self.cache.get(&identity.user_id) {
            return Ok(*cached);
        }

        self.ensure_agent_profile(identity).await?;

        let rows: Vec<RoleAssignment> = select(
            self.store.as_ref(),
            &Query::of::<RoleAssignment>()
                .eq("user_id", &identity.user_id)
                .eq("is_active", true),
        )
        .await?;

        let grant = match effective_role(&rows) {
            Some(role) => Some(RoleGrant::assigned(role)),
            None => match self.config.fallback_policy {
                FallbackPolicy::Deny => None,
                FallbackPolicy::GrantCashier => Some(RoleGrant {
                    role: Role::Cashier,
                    is_active: true,
                    source: GrantSource::Fallback,
                }),
            },
        };

        let outcome = match grant {
            Some(RoleGrant {
                source: GrantSource::Assigned,
                ..
            }) => "assigned",
            Some(_) => "fallback",
            None => "none",
        };
        if let Some(metrics) = &self.metrics {
            metrics.role_resolution(outcome);
        }
        debug!(user_id = %identity.user_id, outcome, "Resolved role");

        self.cache.insert(identity.user_id.clone(), grant);
        Ok(grant)
    }

    pub async fn context(&self, identity: Identity) -> BingoResult<AccessContext> {
        let grant = self.resolve(&identity).await?;
        Ok(AccessContext::new(identity, grant))
    }

    pub fn invalidate(&self, user_id: &str) {
        self.cache.remove(user_id);
    }

    pub async fn refresh(&self, identity: &Identity) -> BingoResult<Option<RoleGrant>> {
        self.invalidate(&identity.user_id);
        self.resolve(identity).await
    }

    /// The agent profile row is created on first resolution; it carries no privilege
    async fn ensure_agent_profile(&self, identity: &Identity) -> BingoResult<()> {
        let mut profile = AgentProfile::new(&identity.user_id, &self.currency);
        profile.full_name = Some(
            identity
                .full_name
                .clone()
                .unwrap_or_else(|| FALLBACK_FULL_NAME.to_string()),
        );
        profile.phone_number = Some(identity.phone_number.clone());

        let (_, created) = procedures::ensure_agent_profile(self.store.as_ref(), profile).await?;
        if created {
            info!(user_id = %identity.user_id, "Created agent profile");
        }
        Ok(())
    }

    /// Give configured phone numbers a super_admin row at sign-up
    pub async fn bootstrap(&self, identity: &Identity) -> BingoResult<bool> {
        if !self
            .config
            .bootstrap_super_admins
            .iter()
            .any(|phone| phone == &identity.phone_number)
        {
            return Ok(false);
        }

        let granted = procedures::assign_user_role(
            self.store.as_ref(),
            &identity.user_id,
            Role::SuperAdmin,
            "system",
        )
        .await?;
        self.invalidate(&identity.user_id);
        if granted {
            warn!(user_id = %identity.user_id, "Bootstrapped super admin for {}", identity.phone_number);
        }
        Ok(granted)
    }

    /// Admins may grant cashier; only super admins grant admin roles
    fn authorize_role_change(ctx: &AccessContext, role: Role) -> Result<(), AuthError> {
        let grant = ctx.require_at_least(Role::Admin)?;
        if role > Role::Cashier && !grant.is_super_admin() {
            return Err(AuthError::Forbidden {
                required: Role::SuperAdmin.to_string(),
                actual: grant.role.to_string(),
            });
        }
        Ok(())
    }

    pub async fn assign_role(
        &self,
        ctx: &AccessContext,
        user_id: &str,
        role: Role,
    ) -> BingoResult<bool> {
        Self::authorize_role_change(ctx, role)?;

        let granted =
            procedures::assign_user_role(self.store.as_ref(), user_id, role, ctx.user_id())
                .await?;
        self.invalidate(user_id);

        if granted {
            let action = AdminAction::new(ctx, "assign_role", format!("Assigned {} role", role))
                .target(Collection::UserRoles, user_id);
            let mut batch = WriteBatch::new();
            batch.put(&action)?;
            self.store.commit(batch).await?;
        }
        Ok(granted)
    }

    pub async fn deactivate_role(
        &self,
        ctx: &AccessContext,
        assignment_id: &str,
    ) -> BingoResult<RoleAssignment> {
        let mut row = fetch::<RoleAssignment>(self.store.as_ref(), assignment_id)
            .await?
            .ok_or_else(|| BingoError::not_found("role assignment not found"))?;
        Self::authorize_role_change(ctx, row.role)?;

        row.is_active = false;
        row.updated_at = Utc::now();

        let action = AdminAction::new(
            ctx,
            "deactivate_role",
            format!("Deactivated {} role", row.role),
        )
        .target(Collection::UserRoles, &row.user_id);

        let mut batch = WriteBatch::new();
        batch.put(&row)?;
        batch.put(&action)?;
        self.store.commit(batch).await?;
        self.invalidate(&row.user_id);

        info!(user_id = %row.user_id, role = %row.role, "Role deactivated");
        Ok(row)
    }

    /// Role rows of a user, newest first; users may read their own
    pub async fn list_roles(
        &self,
        ctx: &AccessContext,
        user_id: &str,
    ) -> BingoResult<Vec<RoleAssignment>> {
        if ctx.user_id() != user_id {
            ctx.require_at_least(Role::Admin)?;
        }
        select(
            self.store.as_ref(),
            &Query::of::<RoleAssignment>()
                .eq("user_id", user_id)
                .order_by("assigned_at", Order::Desc),
        )
        .await
    }
}
