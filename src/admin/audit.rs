//! Administrator audit trail (`admin_actions`)

use crate::access::roles::{AccessContext, Role};
use crate::errors::BingoResult;
use crate::store::{select, Collection, Order, Query, Record, TableStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminAction {
    pub id: String,
    pub admin_id: String,
    pub action_type: String,
    pub description: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Record for AdminAction {
    const COLLECTION: Collection = Collection::AdminActions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl AdminAction {
    pub fn new(ctx: &AccessContext, action_type: &str, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            admin_id: ctx.user_id().to_string(),
            action_type: action_type.to_string(),
            description: description.into(),
            target_type: None,
            target_id: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn target(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.target_type = Some(collection.to_string());
        self.target_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Most recent actions first (super admins only)
pub async fn list_actions(
    store: &dyn TableStore,
    ctx: &AccessContext,
    limit: Option<usize>,
) -> BingoResult<Vec<AdminAction>> {
    ctx.require(&[Role::SuperAdmin])?;
    select(
        store,
        &Query::of::<AdminAction>()
            .order_by("created_at", Order::Desc)
            .limit(limit.unwrap_or(DEFAULT_AUDIT_LIMIT)),
    )
    .await
}
