//! API Request and Response Models
//!
//! Money crosses the API as decimal major units; `decimal` converts at the
//! boundary so the domain only ever sees cents.

use crate::access::{DashboardKind, DashboardSection, GrantSource, Role};
use crate::admin::accounts::AccountForm;
use crate::admin::{
    AccountView, CreditTransaction, CreditType, GameResult, NewAccount,
    NewCredit, NewGameResult, ResultStatus, StatsOverview, UserType,
};
use crate::game::SessionSnapshot;
use crate::identity::Identity;
use crate::wallet::{
    Amount, DepositRequest, PaymentMethod, Transaction, TransactionStatus, TransactionType,
    WithdrawalRequest,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `Amount` as a JSON number of major units
pub mod decimal {
    use crate::wallet::Amount;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(amount.to_decimal())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::from_decimal(value).map_err(D::Error::custom)
    }
}

fn zero() -> Amount {
    Amount::ZERO
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub version: String,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

// ---- auth ----

#[derive(Debug, Clone, Deserialize)]
pub struct SignInBody {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetBody {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResetBody {
    pub phone_number: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub user: Identity,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: Identity,
    pub role: Option<Role>,
    pub role_source: Option<GrantSource>,
    pub is_admin: bool,
    pub is_cashier: bool,
    pub dashboard: Option<DashboardKind>,
}

// ---- game ----

#[derive(Debug, Clone, Deserialize)]
pub struct MarkBody {
    pub number: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub token: String,
    pub number: u8,
    pub announce_for_ms: u64,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkResponse {
    pub number: u8,
    pub marked: bool,
    pub session: SessionSnapshot,
}

// ---- wallet ----

#[derive(Debug, Clone, Deserialize)]
pub struct DepositBody {
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub phone_number: String,
}

impl From<DepositBody> for DepositRequest {
    fn from(body: DepositBody) -> Self {
        DepositRequest {
            amount: body.amount,
            payment_method: body.payment_method,
            phone_number: body.phone_number,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalBody {
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub account_number: String,
}

impl From<WithdrawalBody> for WithdrawalRequest {
    fn from(body: WithdrawalBody) -> Self {
        WithdrawalRequest {
            amount: body.amount,
            payment_method: body.payment_method,
            account_number: body.account_number,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmBody {
    pub confirmation_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// A transaction without its code hash
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub currency: String,
    pub payment_method: Option<PaymentMethod>,
    pub phone_number: Option<String>,
    pub account_number: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionView {
    fn from(t: Transaction) -> Self {
        TransactionView {
            id: t.id,
            transaction_id: t.transaction_id,
            transaction_type: t.transaction_type,
            status: t.status,
            amount: t.amount,
            currency: t.currency,
            payment_method: t.payment_method,
            phone_number: t.phone_number,
            account_number: t.account_number,
            description: t.description,
            metadata: t.metadata,
            created_at: t.created_at,
            completed_at: t.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub transaction: TransactionView,
    pub message: String,
    /// Only present when code echo is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedResponse {
    pub transaction: TransactionView,
    #[serde(with = "decimal")]
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    #[serde(with = "decimal")]
    pub balance: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
    pub id: PaymentMethod,
    pub name: &'static str,
}

// ---- admin ----

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub role: Role,
    pub dashboard: DashboardKind,
    pub sections: &'static [DashboardSection],
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_agents: usize,
    pub total_cartelas: usize,
    pub published_results: usize,
    pub pending_results: usize,
    #[serde(with = "decimal")]
    pub total_received_credit: Amount,
}

impl From<StatsOverview> for StatsResponse {
    fn from(s: StatsOverview) -> Self {
        StatsResponse {
            total_agents: s.total_agents,
            total_cartelas: s.total_cartelas,
            published_results: s.published_results,
            pending_results: s.pending_results,
            total_received_credit: s.total_received_credit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultBody {
    pub game_date: NaiveDate,
    pub draw_number: u32,
    pub called_numbers: Vec<u8>,
    #[serde(default)]
    pub winning_cards: Vec<String>,
    #[serde(default = "zero", with = "decimal")]
    pub total_prize_pool: Amount,
}

impl From<ResultBody> for NewGameResult {
    fn from(b: ResultBody) -> Self {
        NewGameResult {
            game_date: b.game_date,
            draw_number: b.draw_number,
            called_numbers: b.called_numbers,
            winning_cards: b.winning_cards,
            total_prize_pool: b.total_prize_pool,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultQuery {
    pub status: Option<ResultStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub id: String,
    pub game_date: NaiveDate,
    pub draw_number: u32,
    pub called_numbers: Vec<u8>,
    pub winning_cards: Vec<String>,
    #[serde(with = "decimal")]
    pub total_prize_pool: Amount,
    pub status: ResultStatus,
    pub created_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<GameResult> for ResultView {
    fn from(r: GameResult) -> Self {
        ResultView {
            id: r.id,
            game_date: r.game_date,
            draw_number: r.draw_number,
            called_numbers: r.called_numbers,
            winning_cards: r.winning_cards,
            total_prize_pool: r.total_prize_pool,
            status: r.status,
            created_by: r.created_by,
            published_at: r.published_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub result: ResultView,
    pub cartelas_checked: usize,
    pub winners: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditBody {
    pub transaction_type: CreditType,
    #[serde(default)]
    pub from_user: Option<String>,
    #[serde(default)]
    pub to_user: Option<String>,
    #[serde(with = "decimal")]
    pub amount: Amount,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_status: bool,
}

impl From<CreditBody> for NewCredit {
    fn from(b: CreditBody) -> Self {
        NewCredit {
            transaction_type: b.transaction_type,
            from_user: b.from_user,
            to_user: b.to_user,
            amount: b.amount,
            purpose: b.purpose,
            notes: b.notes,
            receipt_status: b.receipt_status,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditQuery {
    pub transaction_type: Option<CreditType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditView {
    pub id: String,
    pub transaction_type: CreditType,
    pub from_user: Option<String>,
    pub to_user: Option<String>,
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub receipt_status: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransaction> for CreditView {
    fn from(c: CreditTransaction) -> Self {
        CreditView {
            id: c.id,
            transaction_type: c.transaction_type,
            from_user: c.from_user,
            to_user: c.to_user,
            amount: c.amount,
            purpose: c.purpose,
            notes: c.notes,
            receipt_status: c.receipt_status,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountBody {
    pub user_type: UserType,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub assigned_super_agent: Option<String>,
    #[serde(default = "zero", with = "decimal")]
    pub initial_balance: Amount,
}

impl From<AccountBody> for NewAccount {
    fn from(b: AccountBody) -> Self {
        NewAccount {
            user_type: b.user_type,
            full_name: b.full_name,
            phone_number: b.phone_number,
            password: b.password,
            assigned_super_agent: b.assigned_super_agent,
            initial_balance: b.initial_balance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountQuery {
    pub user_type: UserType,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub assigned_super_agent: Option<String>,
    #[serde(with = "decimal")]
    pub balance: Amount,
    pub is_active: bool,
    pub total_cartelas_handled: u32,
    pub total_transactions: u32,
    pub created_at: DateTime<Utc>,
}

impl From<AccountView> for AccountResponse {
    fn from(v: AccountView) -> Self {
        AccountResponse {
            id: v.account.id,
            user_id: v.account.user_id,
            user_type: v.account.user_type,
            full_name: v.full_name,
            phone_number: v.phone_number,
            assigned_super_agent: v.account.assigned_super_agent,
            balance: v.account.balance,
            is_active: v.account.is_active,
            total_cartelas_handled: v.account.total_cartelas_handled,
            total_transactions: v.account.total_transactions,
            created_at: v.account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountFormView {
    pub user_type: UserType,
    #[serde(flatten)]
    pub form: AccountForm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleBody {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleChangeResponse {
    pub user_id: String,
    pub role: Role,
    /// False when the user already held the role
    pub granted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_amounts_round_to_cents() {
        let body: DepositBody = serde_json::from_str(
            r#"{"amount": 10.125, "payment_method": "telebirr", "phone_number": "+251911223344"}"#,
        )
        .unwrap();
        assert_eq!(body.amount, Amount::from_cents(1013));

        let view = BalanceResponse {
            balance: Amount::from_cents(999),
            currency: "ETB".to_string(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["balance"], serde_json::json!(9.99));
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        let parsed: Result<WithdrawalBody, _> = serde_json::from_str(
            r#"{"amount": "lots", "payment_method": "cbe", "account_number": "1000"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_optional_amount_defaults_to_zero() {
        let body: AccountBody =
            serde_json::from_str(r#"{"user_type": "cashier", "full_name": "Abebe"}"#).unwrap();
        assert_eq!(body.initial_balance, Amount::ZERO);
    }
}
