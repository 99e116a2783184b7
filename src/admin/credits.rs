//! Credit ledger between agents (`credit_transactions`)

use super::audit::AdminAction;
use crate::access::roles::{AccessContext, Role};
use crate::errors::{BingoError, BingoResult, ValidationError};
use crate::store::{fetch, select, Collection, Order, Query, Record, SharedStore, WriteBatch};
use crate::wallet::types::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    SentToAgent,
    SentToShop,
    Received,
    Recharge,
}

/// Append-only ledger row; only `receipt_status` ever changes, false → true
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditTransaction {
    pub id: String,
    pub transaction_type: CreditType,
    /// `None` means the system
    pub from_user: Option<String>,
    pub to_user: Option<String>,
    pub amount: Amount,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub receipt_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for CreditTransaction {
    const COLLECTION: Collection = Collection::CreditTransactions;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCredit {
    pub transaction_type: CreditType,
    #[serde(default)]
    pub from_user: Option<String>,
    #[serde(default)]
    pub to_user: Option<String>,
    pub amount: Amount,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_status: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct CreditLedger {
    store: SharedStore,
}

impl CreditLedger {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn record(&self, ctx: &AccessContext, request: NewCredit) -> BingoResult<CreditTransaction> {
        ctx.require_at_least(Role::Admin)?;
        if !request.amount.is_positive() {
            return Err(ValidationError::invalid("amount", "must be greater than zero").into());
        }

        let from_user = non_empty(request.from_user);
        let to_user = non_empty(request.to_user);
        if from_user.is_some() && from_user == to_user {
            return Err(ValidationError::invalid("to_user", "cannot send credit to the sender").into());
        }

        let now = Utc::now();
        let entry = CreditTransaction {
            id: Uuid::new_v4().to_string(),
            transaction_type: request.transaction_type,
            from_user,
            to_user,
            amount: request.amount,
            purpose: non_empty(request.purpose),
            notes: non_empty(request.notes),
            receipt_status: request.receipt_status,
            created_at: now,
            updated_at: now,
        };

        let action = AdminAction::new(ctx, "record_credit", format!("Recorded credit of {}", entry.amount))
            .target(Collection::CreditTransactions, &entry.id);
        let mut batch = WriteBatch::new();
        batch.put(&entry)?.put(&action)?;
        self.store.commit(batch).await?;

        Ok(entry)
    }

    /// Newest first, optionally by type
    pub async fn list(
        &self,
        ctx: &AccessContext,
        kind: Option<CreditType>,
    ) -> BingoResult<Vec<CreditTransaction>> {
        ctx.require_at_least(Role::Admin)?;
        let mut query = Query::of::<CreditTransaction>();
        if let Some(kind) = kind {
            query = query.eq("transaction_type", kind);
        }
        select(self.store.as_ref(), &query.order_by("created_at", Order::Desc)).await
    }

    /// Mark receipt; acknowledging twice is a no-op
    pub async fn acknowledge(&self, ctx: &AccessContext, id: &str) -> BingoResult<CreditTransaction> {
        ctx.require_at_least(Role::Admin)?;
        let mut entry = fetch::<CreditTransaction>(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| BingoError::not_found(format!("credit transaction {} not found", id)))?;
        if entry.receipt_status {
            return Ok(entry);
        }

        entry.receipt_status = true;
        entry.updated_at = Utc::now();
        let action = AdminAction::new(ctx, "acknowledge_credit", "Acknowledged credit receipt")
            .target(Collection::CreditTransactions, &entry.id);

        let mut batch = WriteBatch::new();
        batch.expect(Collection::CreditTransactions, &entry.id, "receipt_status", false);
        batch.put(&entry)?.put(&action)?;
        self.store.commit(batch).await?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::roles::RoleGrant;
    use crate::identity::Identity;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn admin() -> AccessContext {
        AccessContext::new(
            Identity {
                user_id: "admin-1".to_string(),
                phone_number: "+251911000000".to_string(),
                full_name: None,
            },
            Some(RoleGrant::assigned(Role::Admin)),
        )
    }

    fn credit(kind: CreditType, cents: i64) -> NewCredit {
        NewCredit {
            transaction_type: kind,
            from_user: None,
            to_user: Some("agent-7".to_string()),
            amount: Amount::from_cents(cents),
            purpose: Some("float".to_string()),
            notes: None,
            receipt_status: false,
        }
    }

    #[tokio::test]
    async fn test_amount_must_be_positive() {
        let ledger = CreditLedger::new(Arc::new(MemoryStore::new()));
        assert!(ledger.record(&admin(), credit(CreditType::Recharge, 0)).await.is_err());
        assert!(ledger.record(&admin(), credit(CreditType::Recharge, -100)).await.is_err());
        assert!(ledger.record(&admin(), credit(CreditType::Recharge, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_type_and_acknowledge() {
        let ledger = CreditLedger::new(Arc::new(MemoryStore::new()));
        let sent = ledger
            .record(&admin(), credit(CreditType::SentToAgent, 50_000))
            .await
            .unwrap();
        ledger
            .record(&admin(), credit(CreditType::Received, 20_000))
            .await
            .unwrap();

        let received = ledger.list(&admin(), Some(CreditType::Received)).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(ledger.list(&admin(), None).await.unwrap().len(), 2);

        let acked = ledger.acknowledge(&admin(), &sent.id).await.unwrap();
        assert!(acked.receipt_status);
        let again = ledger.acknowledge(&admin(), &sent.id).await.unwrap();
        assert!(again.receipt_status);
    }
}
