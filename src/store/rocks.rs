//! RocksDB-backed table store
//!
//! Rows are stored under `<collection>:<id>` with JSON values. Batches are
//! checked and written under a commit lock so preconditions cannot race a
//! concurrent writer inside this process.

use super::{Collection, TableStore, WriteBatch, WriteOp};
use crate::config::StorageConfig;
use crate::errors::StorageError;
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, DB};
use serde_json::Value;
use std::{path::Path, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

fn row_key(collection: Collection, id: &str) -> String {
    format!("{}:{}", collection, id)
}

fn decode_row(key: &[u8], bytes: &[u8]) -> Result<Value, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!(
            "row {} is not valid JSON: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })
}

impl RocksStore {
    /// Open (or create) the database at the configured directory
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.clear_on_start && Path::new(&config.data_directory).exists() {
            warn!("Clearing existing data directory {}", config.data_directory);
            DB::destroy(&Options::default(), &config.data_directory)
                .map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        }
        Self::open_path(&config.data_directory)
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        info!("Opened RocksDB store at {}", path.as_ref().display());

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn read(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        let key = row_key(collection, id);
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(decode_row(key.as_bytes(), &bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl TableStore for RocksStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        self.read(collection, id)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
        let prefix = format!("{}:", collection);
        let mut rows = Vec::new();

        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            rows.push(decode_row(&key, &value)?);
        }

        Ok(rows)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let _guard = self.commit_lock.lock().await;

        for pre in &batch.preconditions {
            let current = self.read(pre.collection, &pre.id)?;
            pre.check(current.as_ref())?;
        }

        let mut write = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    value,
                } => {
                    let bytes = serde_json::to_vec(&value)
                        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
                    write.put(row_key(collection, &id).as_bytes(), bytes);
                }
                WriteOp::Delete { collection, id } => {
                    write.delete(row_key(collection, &id).as_bytes());
                }
            }
        }

        self.db
            .write(write)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scan_stays_inside_collection() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open_path(dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        batch.ops.push(WriteOp::Put {
            collection: Collection::Agents,
            id: "a1".to_string(),
            value: json!({"id": "a1"}),
        });
        batch.ops.push(WriteOp::Put {
            collection: Collection::AdminActions,
            id: "x1".to_string(),
            value: json!({"id": "x1"}),
        });
        store.commit(batch).await.unwrap();

        assert_eq!(store.scan(Collection::Agents).await.unwrap().len(), 1);
        assert_eq!(store.scan(Collection::AdminActions).await.unwrap().len(), 1);
        assert!(store.scan(Collection::BingoCards).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open_path(dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        batch.ops.push(WriteOp::Put {
            collection: Collection::Agents,
            id: "a1".to_string(),
            value: json!({"id": "a1", "balance": 0}),
        });
        batch.expect(Collection::Agents, "a1", "balance", 0);
        assert!(matches!(
            store.commit(batch).await,
            Err(StorageError::Conflict { .. })
        ));
        assert!(store.get(Collection::Agents, "a1").await.unwrap().is_none());
    }
}
