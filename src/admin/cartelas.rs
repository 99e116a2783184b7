//! Issued bingo cards (cartelas) and public card verification

use super::audit::AdminAction;
use super::groups::{stage_counter_update, CartelaGroup, GroupCounter};
use crate::access::roles::{AccessContext, Role};
use crate::errors::{BingoError, BingoResult, StorageError, ValidationError};
use crate::game::card::{generate_card, BingoCard};
use crate::identity::validate_phone;
use crate::store::{
    fetch, procedures, select, select_one, Collection, Order, Query, Record, SharedStore,
    WriteBatch,
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BULK_CARTELAS: usize = 100;
pub const DEFAULT_LIST_LIMIT: usize = 200;
const ISSUE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Expired,
    Winner,
    Checked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Expired => "expired",
            CardStatus::Winner => "winner",
            CardStatus::Checked => "checked",
        }
    }
}

/// Row of `bingo_cards`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cartela {
    pub id: String,
    pub card_number: String,
    /// Issuing staff member
    pub user_id: String,
    pub user_name: String,
    pub user_phone: String,
    pub card_data: BingoCard,
    pub game_date: NaiveDate,
    pub status: CardStatus,
    pub is_winner: bool,
    pub matched_numbers: u32,
    pub group_id: Option<String>,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Cartela {
    const COLLECTION: Collection = Collection::BingoCards;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Row of `card_numbers`, keyed by the card number it reserves
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardNumberClaim {
    pub card_number: String,
    pub cartela_id: String,
    pub claimed_at: DateTime<Utc>,
}

impl CardNumberClaim {
    fn of(cartela: &Cartela) -> Self {
        Self {
            card_number: cartela.card_number.clone(),
            cartela_id: cartela.id.clone(),
            claimed_at: cartela.created_at,
        }
    }
}

impl Record for CardNumberClaim {
    const COLLECTION: Collection = Collection::CardNumbers;

    fn id(&self) -> &str {
        &self.card_number
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCartela {
    pub player_name: String,
    pub player_phone: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub game_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCartelas {
    pub count: usize,
    pub user_name: String,
    pub user_phone: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub game_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartelaFilter {
    /// Case-insensitive substring of the card number
    pub search: Option<String>,
    pub status: Option<CardStatus>,
    pub group_id: Option<String>,
    pub limit: Option<usize>,
}

/// Row of `card_verifications`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardVerification {
    pub id: String,
    pub card_number: String,
    pub verification_result: serde_json::Value,
    pub user_agent: Option<String>,
    pub verified_at: DateTime<Utc>,
}

impl Record for CardVerification {
    const COLLECTION: Collection = Collection::CardVerifications;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationResult {
    pub card_number: String,
    pub is_valid: bool,
    pub is_winner: bool,
    pub matched_numbers: u32,
    /// Card status, or `invalid` when no such card exists
    pub status: String,
    pub user_name: Option<String>,
    pub game_date: Option<NaiveDate>,
}

pub fn normalize_card_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub struct CartelaManager {
    store: SharedStore,
}

impl CartelaManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn load_group(&self, group_id: Option<&str>) -> BingoResult<Option<CartelaGroup>> {
        match group_id.filter(|g| !g.trim().is_empty()) {
            None => Ok(None),
            Some(id) => fetch::<CartelaGroup>(self.store.as_ref(), id)
                .await?
                .map(Some)
                .ok_or_else(|| BingoError::not_found(format!("cartela group {} not found", id))),
        }
    }

    fn new_cartela(
        ctx: &AccessContext,
        card_number: String,
        card: BingoCard,
        user_name: &str,
        user_phone: &str,
        game_date: NaiveDate,
        group: Option<&CartelaGroup>,
    ) -> Cartela {
        let now = Utc::now();
        Cartela {
            id: Uuid::new_v4().to_string(),
            card_number,
            user_id: ctx.user_id().to_string(),
            user_name: user_name.to_string(),
            user_phone: user_phone.to_string(),
            card_data: card,
            game_date,
            status: CardStatus::Active,
            is_winner: false,
            matched_numbers: 0,
            group_id: group.map(|g| g.id.clone()),
            assigned_agent: group.and_then(|g| g.assigned_agent.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Issue a single cartela to a named player; counts as a sale in its group
    pub async fn issue(&self, ctx: &AccessContext, request: IssueCartela) -> BingoResult<Cartela> {
        let request = GenerateCartelas {
            count: 1,
            user_name: request.player_name,
            user_phone: request.player_phone,
            group_id: request.group_id,
            game_date: request.game_date,
        };
        self.issue_batch(ctx, request, true)
            .await?
            .pop()
            .ok_or_else(|| BingoError::not_found("no cartela issued"))
    }

    /// Issue `count` cartelas in one batch
    pub async fn generate(
        &self,
        ctx: &AccessContext,
        request: GenerateCartelas,
    ) -> BingoResult<Vec<Cartela>> {
        self.issue_batch(ctx, request, false).await
    }

    async fn issue_batch(
        &self,
        ctx: &AccessContext,
        request: GenerateCartelas,
        sold: bool,
    ) -> BingoResult<Vec<Cartela>> {
        ctx.require_at_least(Role::Cashier)?;

        if request.count == 0 || request.count > MAX_BULK_CARTELAS {
            return Err(ValidationError::invalid(
                "count",
                format!("must be between 1 and {}", MAX_BULK_CARTELAS),
            )
            .into());
        }
        let name = request.user_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("user_name".to_string()).into());
        }
        let phone = request.user_phone.trim();
        validate_phone(phone)?;

        let game_date = request.game_date.unwrap_or_else(|| Utc::now().date_naive());
        let mut rng = StdRng::from_entropy();

        let mut attempt = 1;
        loop {
            let mut group = self.load_group(request.group_id.as_deref()).await?;
            let mut numbers = HashSet::new();
            let mut cartelas = Vec::with_capacity(request.count);
            while cartelas.len() < request.count {
                let number =
                    procedures::generate_card_number(self.store.as_ref(), &mut rng, game_date)
                        .await?;
                if !numbers.insert(number.clone()) {
                    continue;
                }
                let card = generate_card(&mut rng);
                cartelas.push(Self::new_cartela(
                    ctx,
                    number,
                    card,
                    name,
                    phone,
                    game_date,
                    group.as_ref(),
                ));
            }

            let mut batch = WriteBatch::new();
            for cartela in &cartelas {
                batch.put(cartela)?.put(&CardNumberClaim::of(cartela))?;
                batch.expect_absent(Collection::CardNumbers, &cartela.card_number);
            }
            if let Some(group) = group.as_mut() {
                let issued = cartelas.len() as u32;
                if sold {
                    stage_counter_update(
                        &mut batch,
                        group,
                        &[(GroupCounter::Total, issued), (GroupCounter::Sold, issued)],
                    )?;
                } else {
                    stage_counter_update(&mut batch, group, &[(GroupCounter::Total, issued)])?;
                }
            }
            let action = AdminAction::new(
                ctx,
                "generate_cartelas",
                format!("Issued {} cartela(s) for {}", cartelas.len(), name),
            )
            .with_metadata(serde_json::json!({
                "card_numbers": cartelas.iter().map(|c| c.card_number.as_str()).collect::<Vec<_>>(),
                "group_id": group.as_ref().map(|g| g.id.as_str()),
                "sold": sold,
            }));
            batch.put(&action)?;

            match self.store.commit(batch).await {
                Ok(()) => {
                    info!(
                        issuer = %ctx.user_id(),
                        "🎫 Issued {} cartela(s) for {}",
                        cartelas.len(),
                        game_date
                    );
                    return Ok(cartelas);
                }
                Err(StorageError::Conflict {
                    collection: Collection::CardNumbers,
                    id,
                    ..
                }) if attempt < ISSUE_ATTEMPTS => {
                    warn!(attempt, "Card number {} claimed concurrently, redrawing", id);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Newest first
    pub async fn list(&self, ctx: &AccessContext, filter: CartelaFilter) -> BingoResult<Vec<Cartela>> {
        ctx.require_at_least(Role::Cashier)?;

        let mut query = Query::of::<Cartela>();
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("card_number", search);
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status);
        }
        if let Some(group_id) = filter.group_id {
            query = query.eq("group_id", group_id);
        }

        select(
            self.store.as_ref(),
            &query
                .order_by("created_at", Order::Desc)
                .limit(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)),
        )
        .await
    }

    /// Public lookup; every attempt is logged whether or not the card exists
    pub async fn verify(
        &self,
        card_number: &str,
        user_agent: Option<String>,
    ) -> BingoResult<VerificationResult> {
        let number = normalize_card_number(card_number);
        if number.is_empty() {
            return Err(ValidationError::MissingField("card_number".to_string()).into());
        }

        let cartela: Option<Cartela> = select_one(
            self.store.as_ref(),
            Query::of::<Cartela>().eq("card_number", &number),
        )
        .await?;

        let result = match &cartela {
            Some(c) => VerificationResult {
                card_number: number.clone(),
                is_valid: true,
                is_winner: c.is_winner,
                matched_numbers: c.matched_numbers,
                status: c.status.as_str().to_string(),
                user_name: Some(c.user_name.clone()),
                game_date: Some(c.game_date),
            },
            None => VerificationResult {
                card_number: number.clone(),
                is_valid: false,
                is_winner: false,
                matched_numbers: 0,
                status: "invalid".to_string(),
                user_name: None,
                game_date: None,
            },
        };

        let now = Utc::now();
        let log = CardVerification {
            id: Uuid::new_v4().to_string(),
            card_number: number,
            verification_result: serde_json::json!({
                "found": result.is_valid,
                "status": result.status,
                "timestamp": now,
                "user_agent": user_agent,
            }),
            user_agent,
            verified_at: now,
        };
        let mut batch = WriteBatch::new();
        batch.put(&log)?;
        self.store.commit(batch).await?;

        Ok(result)
    }
}
