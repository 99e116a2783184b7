//! Wallet data types

use crate::errors::ValidationError;
use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money in minor units (cents)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub const fn from_major(units: i64) -> Self {
        Amount(units * 100)
    }

    /// Convert a decimal major-unit value, rounding half away from zero to cents
    pub fn from_decimal(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::invalid("amount", "must be a finite number"));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 / 2.0 {
            return Err(ValidationError::invalid("amount", "out of range"));
        }
        Ok(Amount(cents as i64))
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Bet,
    Win,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Bet => "bet",
            TransactionType::Win => "win",
            TransactionType::Refund => "refund",
        }
    }

    /// Whether completing this type adds to the balance
    pub fn credits_balance(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::Win | TransactionType::Refund
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    /// Defined for the record shape; no workflow step moves a transaction here
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Telebirr,
    Cbe,
    Awash,
    Dashen,
    BankOfAbyssinia,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Telebirr,
        PaymentMethod::Cbe,
        PaymentMethod::Awash,
        PaymentMethod::Dashen,
        PaymentMethod::BankOfAbyssinia,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Telebirr => "TeleBirr",
            PaymentMethod::Cbe => "Commercial Bank of Ethiopia",
            PaymentMethod::Awash => "Awash Bank",
            PaymentMethod::Dashen => "Dashen Bank",
            PaymentMethod::BankOfAbyssinia => "Bank of Abyssinia",
        }
    }
}

/// Row of the `transactions` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Amount,
    pub currency: String,
    pub payment_method: Option<PaymentMethod>,
    pub phone_number: Option<String>,
    pub account_number: Option<String>,
    /// SHA-256 hex of the confirmation code
    pub confirmation_code_hash: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Row of the `agents` collection; holds the wallet balance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Same as the user id
    pub id: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub balance: Amount,
    pub currency: String,
    #[serde(default)]
    pub total_games_played: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    pub fn new(user_id: &str, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: user_id.to_string(),
            full_name: None,
            phone_number: None,
            balance: Amount::ZERO,
            currency: currency.to_string(),
            total_games_played: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for AgentProfile {
    const COLLECTION: Collection = Collection::Agents;

    fn id(&self) -> &str {
        &self.id
    }
}
