//! EthioBingo API server
//!
//! Loads configuration (file, then `ETHIOBINGO_*` env, then CLI flags),
//! opens the table store and serves the HTTP API.

use clap::Parser;
use ethiobingo::{
    api::{init_tracing, ApiServer, AppState},
    config::{BingoConfig, ConfigLoader, FallbackPolicy, StorageBackend},
    identity::LocalIdentityProvider,
    metrics::Metrics,
    open_store,
    wallet::LoggingNotifier,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ethiobingo")]
#[command(about = "Ethiopian Bingo game and cartela management server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Start from the production preset instead of the defaults
    #[arg(long)]
    production: bool,

    /// API server host
    #[arg(long)]
    host: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend (memory or rocksdb)
    #[arg(long, value_parser = parse_backend)]
    storage: Option<StorageBackend>,

    /// Database directory
    #[arg(long)]
    db_path: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Treat authenticated users without a role as cashiers
    #[arg(long)]
    grant_cashier_fallback: bool,

    /// Phone numbers promoted to super admin at sign-up (comma-separated)
    #[arg(long)]
    bootstrap_super_admins: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    log_json: bool,
}

fn parse_backend(value: &str) -> Result<StorageBackend, String> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "rocksdb" => Ok(StorageBackend::RocksDb),
        other => Err(format!("unknown storage backend '{}'", other)),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Args {
    fn apply(&self, config: &mut BingoConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(path) = &self.db_path {
            config.storage.data_directory = path.clone();
        }
        if let Some(origins) = &self.cors_origins {
            config.server.allowed_origins = split_list(origins);
        }
        if let Some(timeout) = self.timeout {
            config.server.request_timeout_secs = timeout;
        }
        if self.grant_cashier_fallback {
            config.access.fallback_policy = FallbackPolicy::GrantCashier;
        }
        if let Some(phones) = &self.bootstrap_super_admins {
            config.access.bootstrap_super_admins = split_list(phones);
        }
        if self.log_json {
            config.monitoring.log_json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    } else if args.production {
        loader = loader.with_base(BingoConfig::production());
    }
    let mut config = loader.load()?;
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.monitoring);
    info!("📦 Opening {:?} store", config.storage.backend);
    let store = open_store(&config.storage)?;

    let metrics = if config.monitoring.enable_metrics {
        Some(Arc::new(Metrics::new()?))
    } else {
        None
    };

    let identity = LocalIdentityProvider::new(store.clone(), config.identity.clone());
    let state = Arc::new(AppState::new(
        config,
        store,
        Arc::new(identity),
        Arc::new(LoggingNotifier),
        metrics,
    ));

    ApiServer::new(state).run().await
}
