//! Table store
//!
//! Named collections of JSON rows keyed by id. Reads go through [`Query`]
//! (equality / case-insensitive contains / ordering / limit); writes go
//! through [`WriteBatch`], which commits atomically and can carry field
//! preconditions so read-check-write sequences are safe at the storage
//! boundary.

pub mod memory;
pub mod procedures;
pub mod query;
pub mod rocks;

pub use memory::MemoryStore;
pub use query::{Order, Query};
pub use rocks::RocksStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{BingoResult, StorageError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr, sync::Arc};

/// Collections known to the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    UserRoles,
    Agents,
    BingoCards,
    Transactions,
    CreditTransactions,
    GameResults,
    CartelaGroups,
    UserAccounts,
    CardVerifications,
    AdminActions,
    Identities,
    CardNumbers,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::UserRoles,
        Collection::Agents,
        Collection::BingoCards,
        Collection::Transactions,
        Collection::CreditTransactions,
        Collection::GameResults,
        Collection::CartelaGroups,
        Collection::UserAccounts,
        Collection::CardVerifications,
        Collection::AdminActions,
        Collection::Identities,
        Collection::CardNumbers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::UserRoles => "user_roles",
            Collection::Agents => "agents",
            Collection::BingoCards => "bingo_cards",
            Collection::Transactions => "transactions",
            Collection::CreditTransactions => "credit_transactions",
            Collection::GameResults => "game_results",
            Collection::CartelaGroups => "cartela_groups",
            Collection::UserAccounts => "user_accounts",
            Collection::CardVerifications => "card_verifications",
            Collection::AdminActions => "admin_actions",
            Collection::Identities => "identities",
            Collection::CardNumbers => "card_numbers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StorageError::ReadFailed(format!("unknown collection '{}'", s)))
    }
}

/// A typed row living in one collection
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Single write inside a batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        collection: Collection,
        id: String,
        value: Value,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

/// What a precondition requires of the stored row
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// `field` must still equal `value`
    Field { field: String, value: Value },
    /// No row may exist under the id yet
    Absent,
}

/// Condition a row must still satisfy for the batch to commit
#[derive(Debug, Clone)]
pub struct Precondition {
    pub collection: Collection,
    pub id: String,
    pub expected: Expected,
}

impl Precondition {
    /// Check the precondition against the row currently stored
    pub fn check(&self, current: Option<&Value>) -> Result<(), StorageError> {
        let (holds, field) = match &self.expected {
            Expected::Field { field, value } => (
                current
                    .and_then(|row| row.get(field))
                    .map(|v| v == value)
                    .unwrap_or(false),
                field.as_str(),
            ),
            Expected::Absent => (current.is_none(), "exists"),
        };

        if holds {
            Ok(())
        } else {
            Err(StorageError::Conflict {
                collection: self.collection,
                id: self.id.clone(),
                field: field.to_string(),
            })
        }
    }
}

/// Atomic group of writes with optional preconditions
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
    pub preconditions: Vec<Precondition>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an upsert of a typed record
    pub fn put<T: Record>(&mut self, record: &T) -> Result<&mut Self, StorageError> {
        let value = serde_json::to_value(record).map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to encode {} row {}: {}",
                T::COLLECTION,
                record.id(),
                e
            ))
        })?;
        self.ops.push(WriteOp::Put {
            collection: T::COLLECTION,
            id: record.id().to_string(),
            value,
        });
        Ok(self)
    }

    pub fn delete(&mut self, collection: Collection, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
        });
        self
    }

    /// Require `field` of the stored row to equal `expected` at commit time
    pub fn expect(
        &mut self,
        collection: Collection,
        id: impl Into<String>,
        field: impl Into<String>,
        expected: impl Serialize,
    ) -> &mut Self {
        self.preconditions.push(Precondition {
            collection,
            id: id.into(),
            expected: Expected::Field {
                field: field.into(),
                value: serde_json::to_value(expected).unwrap_or(Value::Null),
            },
        });
        self
    }

    /// Require that no row exists under `id` at commit time
    pub fn expect_absent(&mut self, collection: Collection, id: impl Into<String>) -> &mut Self {
        self.preconditions.push(Precondition {
            collection,
            id: id.into(),
            expected: Expected::Absent,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Storage interface the domain talks to
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch one row by id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError>;

    /// Every row of a collection, unordered
    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StorageError>;

    /// Apply all writes or none; fails with `Conflict` if a precondition no longer holds
    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Filtered, ordered, limited read
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StorageError> {
        let rows = self.scan(query.collection).await?;
        Ok(query.apply(rows))
    }
}

pub type SharedStore = Arc<dyn TableStore>;

/// Open the backend selected in configuration
pub fn open_store(config: &StorageConfig) -> BingoResult<SharedStore> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::RocksDb => Ok(Arc::new(RocksStore::open(config)?)),
    }
}

fn decode<T: Record>(value: Value) -> Result<T, StorageError> {
    serde_json::from_value(value).map_err(|e| {
        StorageError::CorruptedData(format!("Failed to decode {} row: {}", T::COLLECTION, e))
    })
}

/// Typed fetch by id
pub async fn fetch<T: Record>(store: &dyn TableStore, id: &str) -> BingoResult<Option<T>> {
    match store.get(T::COLLECTION, id).await? {
        Some(value) => Ok(Some(decode(value)?)),
        None => Ok(None),
    }
}

/// Typed select; the query's collection must match the record type
pub async fn select<T: Record>(store: &dyn TableStore, query: &Query) -> BingoResult<Vec<T>> {
    debug_assert_eq!(query.collection, T::COLLECTION);
    let rows = store.select(query).await?;
    let records = rows
        .into_iter()
        .map(decode::<T>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// First row matching the query
pub async fn select_one<T: Record>(store: &dyn TableStore, query: Query) -> BingoResult<Option<T>> {
    let mut rows = select::<T>(store, &query.limit(1)).await?;
    Ok(rows.pop())
}

/// Insert or replace one record
pub async fn upsert<T: Record>(store: &dyn TableStore, record: &T) -> BingoResult<()> {
    let mut batch = WriteBatch::new();
    batch.put(record)?;
    store.commit(batch).await?;
    Ok(())
}

/// Number of rows matching the query
pub async fn count(store: &dyn TableStore, query: &Query) -> BingoResult<usize> {
    Ok(store.select(query).await?.len())
}
