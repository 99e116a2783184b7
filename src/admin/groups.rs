//! Cartela groups (`cartela_groups`)

use super::audit::AdminAction;
use crate::access::roles::{AccessContext, Role};
use crate::errors::{BingoError, BingoResult, ValidationError};
use crate::store::{fetch, select, Collection, Order, Query, Record, SharedStore, WriteBatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartelaGroup {
    pub id: String,
    pub group_name: String,
    pub total_cartelas: u32,
    pub sold_cartelas: u32,
    pub won_cartelas: u32,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for CartelaGroup {
    const COLLECTION: Collection = Collection::CartelaGroups;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub group_name: String,
    #[serde(default)]
    pub total_cartelas: u32,
    #[serde(default)]
    pub assigned_agent: Option<String>,
}

pub struct GroupManager {
    store: SharedStore,
}

impl GroupManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, ctx: &AccessContext, request: NewGroup) -> BingoResult<CartelaGroup> {
        ctx.require_at_least(Role::Admin)?;
        let name = request.group_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("group_name".to_string()).into());
        }

        let now = Utc::now();
        let group = CartelaGroup {
            id: Uuid::new_v4().to_string(),
            group_name: name.to_string(),
            total_cartelas: request.total_cartelas,
            sold_cartelas: 0,
            won_cartelas: 0,
            assigned_agent: request.assigned_agent.filter(|a| !a.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let action = AdminAction::new(ctx, "create_group", format!("Created group {}", name))
            .target(Collection::CartelaGroups, &group.id);
        let mut batch = WriteBatch::new();
        batch.put(&group)?.put(&action)?;
        self.store.commit(batch).await?;

        info!(group_id = %group.id, "Cartela group '{}' created", group.group_name);
        Ok(group)
    }

    /// Newest first
    pub async fn list(&self, ctx: &AccessContext) -> BingoResult<Vec<CartelaGroup>> {
        ctx.require_at_least(Role::Cashier)?;
        select(
            self.store.as_ref(),
            &Query::of::<CartelaGroup>().order_by("created_at", Order::Desc),
        )
        .await
    }

    pub async fn get(&self, group_id: &str) -> BingoResult<CartelaGroup> {
        fetch::<CartelaGroup>(self.store.as_ref(), group_id)
            .await?
            .ok_or_else(|| BingoError::not_found(format!("cartela group {} not found", group_id)))
    }
}

/// Stage counter updates guarded by each counter's current value
pub fn stage_counter_update(
    batch: &mut WriteBatch,
    group: &mut CartelaGroup,
    updates: &[(GroupCounter, u32)],
) -> BingoResult<()> {
    for (field, delta) in updates {
        let current = match field {
            GroupCounter::Total => &mut group.total_cartelas,
            GroupCounter::Sold => &mut group.sold_cartelas,
            GroupCounter::Won => &mut group.won_cartelas,
        };
        batch.expect(Collection::CartelaGroups, &group.id, field.as_str(), *current);
        *current = current.saturating_add(*delta);
    }
    group.updated_at = Utc::now();
    batch.put(&*group)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCounter {
    Total,
    /// Cartelas issued to a named player
    Sold,
    Won,
}

impl GroupCounter {
    fn as_str(&self) -> &'static str {
        match self {
            GroupCounter::Total => "total_cartelas",
            GroupCounter::Sold => "sold_cartelas",
            GroupCounter::Won => "won_cartelas",
        }
    }
}
