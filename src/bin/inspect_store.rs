//! Print row counts and a sample of keys from a RocksDB table store

use ethiobingo::store::{rocks::RocksStore, Collection, TableStore};
use std::path::PathBuf;

const SAMPLE_ROWS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "./DB/ethiobingo_data".to_string()),
    );

    if !db_path.exists() {
        println!("❌ No store found at {:?}", db_path);
        return Ok(());
    }

    let store = RocksStore::open_path(&db_path)?;

    println!("🔍 EthioBingo Store Inspector");
    println!("=============================");
    println!("Path: {:?}\n", db_path);

    let mut total = 0;
    for collection in Collection::ALL {
        let rows = store.scan(collection).await?;
        total += rows.len();
        println!("📋 {} ({} rows)", collection, rows.len());
        for row in rows.iter().take(SAMPLE_ROWS) {
            let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            let status = row
                .get("status")
                .and_then(|v| v.as_str())
                .map(|s| format!(" [{}]", s))
                .unwrap_or_default();
            println!("   {}{}", id, status);
        }
        if rows.len() > SAMPLE_ROWS {
            println!("   ... {} more", rows.len() - SAMPLE_ROWS);
        }
        println!();
    }

    println!("✅ {} rows across {} collections", total, Collection::ALL.len());
    Ok(())
}
