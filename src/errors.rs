//! Error types for the bingo service
//!
//! One root error with a sub-enum per failure family. Validation failures are
//! raised before any store access; backend failures carry the store's message
//! through unchanged so callers can surface it verbatim.

use crate::store::Collection;
use thiserror::Error;

/// Root error type for all library operations
#[derive(Debug, Error)]
pub enum BingoError {
    /// Client-side field checks (amounts, phone numbers, required fields)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Sign-in and role failures
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Lookup misses (card, transaction, confirmation code, session)
    #[error("{0}")]
    NotFound(String),

    /// Any failure surfaced by the table store
    #[error("Backend error: {0}")]
    Backend(#[from] StorageError),

    /// Game state machine rejections
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Configuration loading and validation
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl BingoError {
    pub fn not_found(message: impl Into<String>) -> Self {
        BingoError::NotFound(message.into())
    }
}

/// Field-level validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("amount {amount} is below the minimum of {minimum}")]
    AmountBelowMinimum { amount: String, minimum: String },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: String, available: String },

    #[error("invalid phone number '{0}': must start with +country code")]
    InvalidPhone(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Authentication and authorization failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("user not authenticated")]
    NotAuthenticated,

    #[error("invalid phone number or password")]
    InvalidCredentials,

    #[error("an account already exists for {0}")]
    AccountExists(String),

    #[error("no active role assigned")]
    NoRoleAssigned,

    #[error("insufficient privileges: requires one of [{required}], has {actual}")]
    Forbidden { required: String, actual: String },
}

/// Game session rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game is not active")]
    NotActive,

    #[error("all 75 numbers have been called")]
    PoolExhausted,

    #[error("number {0} has not been called yet")]
    NumberNotCalled(u8),

    #[error("number {0} is outside 1-75")]
    NumberOutOfRange(u8),

    #[error("session limit of {0} reached")]
    SessionLimitReached(usize),

    #[error("game result cannot move from {from} to {to}")]
    ResultTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Table store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("database open failed: {0}")]
    OpenFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("precondition failed on {collection}/{id}: '{field}' no longer holds")]
    Conflict {
        collection: Collection,
        id: String,
        field: String,
    },
}

/// Configuration loading and validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
}

impl From<rocksdb::Error> for BingoError {
    fn from(e: rocksdb::Error) -> Self {
        BingoError::Backend(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for BingoError {
    fn from(e: serde_json::Error) -> Self {
        BingoError::Backend(StorageError::CorruptedData(e.to_string()))
    }
}

/// Convenience type alias for Results
pub type BingoResult<T> = Result<T, BingoError>;
