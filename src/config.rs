//! Configuration management with validation and defaults
//!
//! Centralized configuration: presets for development, production and tests,
//! logical validation, and a loader that layers a TOML file and `ETHIOBINGO_*`
//! environment variables over the defaults.

use crate::errors::{BingoResult, ConfigurationError};
use crate::wallet::Amount;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BingoConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub game: GameConfig,
    pub wallet: WalletConfig,
    pub access: AccessConfig,
    pub identity: IdentityConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub node_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            node_id: "ethiobingo-1".to_string(),
        }
    }
}

/// Which table store backs the service
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps, lost on restart
    Memory,
    /// RocksDB on disk
    RocksDb,
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Whether to clear the database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_directory: "./DB/ethiobingo_data".to_string(),
            clear_on_start: false,
        }
    }
}

/// Free-play game configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How long a called number stays "announced" (animation window)
    pub announcement_ms: u64,
    pub max_sessions: usize,
    /// Sessions untouched for this long are evicted
    pub session_idle_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            announcement_ms: 2000,
            max_sessions: 10_000,
            session_idle_secs: 3600,
        }
    }
}

/// Wallet and transaction workflow configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub currency: String,
    pub min_deposit: Amount,
    pub min_withdrawal: Amount,
    pub confirmation_code_digits: u32,
    /// Pending transactions older than this are failed by the sweeper
    pub pending_ttl_secs: u64,
    pub expiry_sweep_secs: u64,
    /// Return the confirmation code in API responses (no SMS gateway wired)
    pub echo_confirmation_codes: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            currency: "ETB".to_string(),
            min_deposit: Amount::from_major(10),
            min_withdrawal: Amount::from_major(50),
            confirmation_code_digits: 6,
            pending_ttl_secs: 1800,
            expiry_sweep_secs: 60,
            echo_confirmation_codes: true,
        }
    }
}

/// What an authenticated identity gets when it has no active role row
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// No role row means no admin access at all
    #[default]
    Deny,
    /// Any authenticated identity is treated as a cashier
    GrantCashier,
}

/// Role resolution configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub fallback_policy: FallbackPolicy,
    /// Phone numbers promoted to super_admin when they sign up
    pub bootstrap_super_admins: Vec<String>,
}

/// Sign-in sessions and password reset codes
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub session_ttl_secs: u64,
    pub reset_code_ttl_secs: u64,
    /// Wrong guesses before a reset code is burned
    pub max_reset_attempts: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 7 * 24 * 3600,
            reset_code_ttl_secs: 900,
            max_reset_attempts: 5,
        }
    }
}

/// Logging and metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_level: LogLevel,
    pub log_json: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_level: LogLevel::Info,
            log_json: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigurationError::InvalidValue {
                field: "log_level".to_string(),
                value: other.to_string(),
                reason: "expected error|warn|info|debug|trace".to_string(),
            }),
        }
    }
}

impl BingoConfig {
    /// Persistent deployment: RocksDB, no code echo, JSON logs
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::RocksDb,
                clear_on_start: false, // Production: preserve data
                ..Default::default()
            },
            wallet: WalletConfig {
                echo_confirmation_codes: false,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_json: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// In-memory store, short timers, verbose logs
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            game: GameConfig {
                announcement_ms: 10,
                max_sessions: 100,
                session_idle_secs: 60,
            },
            wallet: WalletConfig {
                pending_ttl_secs: 60,
                expiry_sweep_secs: 1,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "0", "must be > 0"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs", "0", "must be > 0"));
        }

        if self.game.max_sessions == 0 {
            return Err(invalid("game.max_sessions", "0", "must be > 0"));
        }

        if self.wallet.currency.trim().is_empty() {
            return Err(invalid("wallet.currency", "", "must not be empty"));
        }

        if !self.wallet.min_deposit.is_positive() {
            return Err(invalid(
                "wallet.min_deposit",
                &self.wallet.min_deposit.to_string(),
                "must be > 0",
            ));
        }

        if !(4..=9).contains(&self.wallet.confirmation_code_digits) {
            return Err(invalid(
                "wallet.confirmation_code_digits",
                &self.wallet.confirmation_code_digits.to_string(),
                "must be between 4 and 9",
            ));
        }

        if self.wallet.min_withdrawal < self.wallet.min_deposit {
            return Err(ConfigurationError::LogicalInconsistency(
                "min_withdrawal must not be lower than min_deposit".to_string(),
            ));
        }

        if self.identity.session_ttl_secs == 0 || self.identity.reset_code_ttl_secs == 0 {
            return Err(invalid("identity", "0", "ttl values must be > 0"));
        }

        if self.identity.max_reset_attempts == 0 {
            return Err(invalid("identity.max_reset_attempts", "0", "must be > 0"));
        }

        if self.wallet.expiry_sweep_secs == 0
            || self.wallet.expiry_sweep_secs > self.wallet.pending_ttl_secs
        {
            return Err(ConfigurationError::LogicalInconsistency(
                "expiry_sweep_secs must be > 0 and not exceed pending_ttl_secs".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn announcement_window(&self) -> Duration {
        Duration::from_millis(self.game.announcement_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.game.session_idle_secs)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.wallet.expiry_sweep_secs)
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
    base: Option<BingoConfig>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset used when no file is given (defaults otherwise)
    pub fn with_base(mut self, base: BingoConfig) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> BingoResult<BingoConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with a custom variable lookup
    pub fn load_with<F>(&self, lookup: F) -> BingoResult<BingoConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match (&self.config_path, &self.base) {
            (Some(path), _) => Self::load_from_file(path)?,
            (None, Some(base)) => base.clone(),
            (None, None) => BingoConfig::default(),
        };

        Self::apply_env_overrides(&mut config, lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    fn load_from_file(path: &str) -> BingoResult<BingoConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }

    /// Apply environment variable overrides
    fn apply_env_overrides<F>(config: &mut BingoConfig, lookup: F) -> BingoResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ETHIOBINGO_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("ETHIOBINGO_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "ETHIOBINGO_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Some(backend) = lookup("ETHIOBINGO_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                _ => {
                    return Err(ConfigurationError::InvalidValue {
                        field: "ETHIOBINGO_STORAGE_BACKEND".to_string(),
                        value: backend,
                        reason: "expected memory|rocksdb".to_string(),
                    }
                    .into())
                }
            };
        }
        if let Some(dir) = lookup("ETHIOBINGO_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Some(policy) = lookup("ETHIOBINGO_FALLBACK_POLICY") {
            config.access.fallback_policy = match policy.to_ascii_lowercase().as_str() {
                "deny" => FallbackPolicy::Deny,
                "grant_cashier" => FallbackPolicy::GrantCashier,
                _ => {
                    return Err(ConfigurationError::InvalidValue {
                        field: "ETHIOBINGO_FALLBACK_POLICY".to_string(),
                        value: policy,
                        reason: "expected deny|grant_cashier".to_string(),
                    }
                    .into())
                }
            };
        }
        if let Some(level) = lookup("ETHIOBINGO_LOG_LEVEL") {
            config.monitoring.log_level = level.parse()?;
        }

        Ok(())
    }
}
