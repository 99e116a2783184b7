//! Dashboard overview counters

use super::credits::{CreditTransaction, CreditType};
use super::results::ResultStatus;
use crate::access::roles::{AccessContext, Role};
use crate::errors::BingoResult;
use crate::store::{count, select, Collection, Query, SharedStore};
use crate::wallet::types::Amount;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsOverview {
    pub total_agents: usize,
    pub total_cartelas: usize,
    pub published_results: usize,
    pub pending_results: usize,
    pub total_received_credit: Amount,
}

pub async fn overview(store: &SharedStore, ctx: &AccessContext) -> BingoResult<StatsOverview> {
    ctx.require_at_least(Role::Cashier)?;
    let store = store.as_ref();

    let received: Vec<CreditTransaction> = select(
        store,
        &Query::of::<CreditTransaction>().eq("transaction_type", CreditType::Received),
    )
    .await?;
    let total_received_credit = received
        .iter()
        .fold(Amount::ZERO, |acc, c| acc.checked_add(c.amount).unwrap_or(acc));

    Ok(StatsOverview {
        total_agents: count(store, &Query::new(Collection::Agents)).await?,
        total_cartelas: count(store, &Query::new(Collection::BingoCards)).await?,
        published_results: count(
            store,
            &Query::new(Collection::GameResults).eq("status", ResultStatus::Published),
        )
        .await?,
        pending_results: count(
            store,
            &Query::new(Collection::GameResults).eq("status", ResultStatus::Pending),
        )
        .await?,
        total_received_credit,
    })
}
