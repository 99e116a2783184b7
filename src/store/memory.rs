//! Process-local table store

use super::{Collection, TableStore, WriteBatch, WriteOp};
use crate::errors::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::RwLock,
};

type Tables = HashMap<Collection, BTreeMap<String, Value>>;

/// In-memory store; batches commit under a single write lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StorageError {
        StorageError::ReadFailed("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.get(&collection).and_then(|t| t.get(id)).cloned())
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables
            .get(&collection)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        for pre in &batch.preconditions {
            let current = tables.get(&pre.collection).and_then(|t| t.get(&pre.id));
            pre.check(current)?;
        }

        for op in batch.ops {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    value,
                } => {
                    tables.entry(collection).or_default().insert(id, value);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(table) = tables.get_mut(&collection) {
                        table.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }
}
