//! Official game results and cartela checking

use super::audit::AdminAction;
use super::cartelas::{normalize_card_number, CardStatus, Cartela};
use super::groups::{stage_counter_update, CartelaGroup, GroupCounter};
use crate::access::roles::{AccessContext, Role};
use crate::errors::{BingoError, BingoResult, GameError, StorageError, ValidationError};
use crate::game::types::MAX_NUMBER;
use crate::store::{fetch, select, Collection, Order, Query, Record, SharedStore, WriteBatch};
use crate::wallet::types::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Published,
    Completed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Published => "published",
            ResultStatus::Completed => "completed",
        }
    }
}

/// Row of `game_results`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameResult {
    pub id: String,
    pub game_date: NaiveDate,
    pub draw_number: u32,
    pub called_numbers: Vec<u8>,
    pub winning_cards: Vec<String>,
    pub total_prize_pool: Amount,
    pub status: ResultStatus,
    pub created_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for GameResult {
    const COLLECTION: Collection = Collection::GameResults;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGameResult {
    pub game_date: NaiveDate,
    pub draw_number: u32,
    pub called_numbers: Vec<u8>,
    #[serde(default)]
    pub winning_cards: Vec<String>,
    #[serde(default)]
    pub total_prize_pool: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub result: GameResult,
    pub cartelas_checked: usize,
    pub winners: usize,
}

fn validate_called_numbers(numbers: &[u8]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for &n in numbers {
        if n == 0 || n > MAX_NUMBER {
            return Err(ValidationError::invalid(
                "called_numbers",
                format!("{} is outside 1-{}", n, MAX_NUMBER),
            ));
        }
        if !seen.insert(n) {
            return Err(ValidationError::invalid(
                "called_numbers",
                format!("{} appears more than once", n),
            ));
        }
    }
    Ok(())
}

pub struct GameResultManager {
    store: SharedStore,
}

impl GameResultManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, ctx: &AccessContext, request: NewGameResult) -> BingoResult<GameResult> {
        ctx.require_at_least(Role::Admin)?;

        if request.draw_number < 1 {
            return Err(ValidationError::invalid("draw_number", "must be at least 1").into());
        }
        validate_called_numbers(&request.called_numbers)?;
        if request.total_prize_pool.is_negative() {
            return Err(ValidationError::invalid("total_prize_pool", "must not be negative").into());
        }

        let winning_cards: Vec<String> = request
            .winning_cards
            .iter()
            .map(|c| normalize_card_number(c))
            .filter(|c| !c.is_empty())
            .collect();

        let now = Utc::now();
        let result = GameResult {
            id: Uuid::new_v4().to_string(),
            game_date: request.game_date,
            draw_number: request.draw_number,
            called_numbers: request.called_numbers,
            winning_cards,
            total_prize_pool: request.total_prize_pool,
            status: ResultStatus::Pending,
            created_by: Some(ctx.user_id().to_string()),
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        let action = AdminAction::new(
            ctx,
            "create_game_result",
            format!("Draw {} for {}", result.draw_number, result.game_date),
        )
        .target(Collection::GameResults, &result.id);
        let mut batch = WriteBatch::new();
        batch.put(&result)?.put(&action)?;
        self.store.commit(batch).await?;

        Ok(result)
    }

    async fn load(&self, id: &str) -> BingoResult<GameResult> {
        fetch::<GameResult>(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| BingoError::not_found(format!("game result {} not found", id)))
    }

    fn transition(
        result: &mut GameResult,
        from: ResultStatus,
        to: ResultStatus,
        batch: &mut WriteBatch,
    ) -> Result<(), GameError> {
        if result.status != from {
            return Err(GameError::ResultTransition {
                from: result.status.as_str(),
                to: to.as_str(),
            });
        }
        batch.expect(Collection::GameResults, &result.id, "status", from);
        result.status = to;
        result.updated_at = Utc::now();
        Ok(())
    }

    /// Pending → published; checks every active cartela of that game date
    pub async fn publish(&self, ctx: &AccessContext, id: &str) -> BingoResult<PublishOutcome> {
        ctx.require_at_least(Role::Admin)?;
        let mut result = self.load(id).await?;

        let mut batch = WriteBatch::new();
        Self::transition(
            &mut result,
            ResultStatus::Pending,
            ResultStatus::Published,
            &mut batch,
        )?;
        result.published_at = Some(Utc::now());

        let called: HashSet<u8> = result.called_numbers.iter().copied().collect();
        let winners: HashSet<&str> = result.winning_cards.iter().map(String::as_str).collect();

        let active: Vec<Cartela> = select(
            self.store.as_ref(),
            &Query::of::<Cartela>()
                .eq("game_date", result.game_date)
                .eq("status", CardStatus::Active),
        )
        .await?;

        let now = Utc::now();
        let mut won_per_group: HashMap<String, u32> = HashMap::new();
        let mut winner_count = 0;
        for mut cartela in active.iter().cloned() {
            cartela.matched_numbers = cartela.card_data.matched_numbers(&called) as u32;
            if winners.contains(cartela.card_number.as_str()) {
                cartela.status = CardStatus::Winner;
                cartela.is_winner = true;
                winner_count += 1;
                if let Some(group_id) = &cartela.group_id {
                    *won_per_group.entry(group_id.clone()).or_default() += 1;
                }
            } else {
                cartela.status = CardStatus::Checked;
            }
            cartela.updated_at = now;
            batch.put(&cartela)?;
        }

        for (group_id, won) in won_per_group {
            if let Some(mut group) = fetch::<CartelaGroup>(self.store.as_ref(), &group_id).await? {
                stage_counter_update(&mut batch, &mut group, &[(GroupCounter::Won, won)])?;
            }
        }

        let action = AdminAction::new(
            ctx,
            "publish_game_result",
            format!(
                "Published draw {} for {} ({} winners)",
                result.draw_number, result.game_date, winner_count
            ),
        )
        .target(Collection::GameResults, &result.id);
        batch.put(&result)?.put(&action)?;

        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StorageError::Conflict { field, .. }) if field == "status" => {
                return Err(GameError::ResultTransition {
                    from: ResultStatus::Published.as_str(),
                    to: ResultStatus::Published.as_str(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            result_id = %result.id,
            "📣 Published draw {} for {}: {} cartelas checked, {} winners",
            result.draw_number,
            result.game_date,
            active.len(),
            winner_count
        );

        Ok(PublishOutcome {
            result,
            cartelas_checked: active.len(),
            winners: winner_count,
        })
    }

    /// Published → completed
    pub async fn complete(&self, ctx: &AccessContext, id: &str) -> BingoResult<GameResult> {
        ctx.require_at_least(Role::Admin)?;
        let mut result = self.load(id).await?;

        let mut batch = WriteBatch::new();
        Self::transition(
            &mut result,
            ResultStatus::Published,
            ResultStatus::Completed,
            &mut batch,
        )?;
        let action = AdminAction::new(
            ctx,
            "complete_game_result",
            format!("Completed draw {} for {}", result.draw_number, result.game_date),
        )
        .target(Collection::GameResults, &result.id);
        batch.put(&result)?.put(&action)?;
        self.store.commit(batch).await?;

        Ok(result)
    }

    /// Newest first, optionally by status
    pub async fn list(
        &self,
        ctx: &AccessContext,
        status: Option<ResultStatus>,
    ) -> BingoResult<Vec<GameResult>> {
        ctx.require_at_least(Role::Admin)?;
        let mut query = Query::of::<GameResult>();
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        select(
            self.store.as_ref(),
            &query.order_by("created_at", Order::Desc),
        )
        .await
    }
}
