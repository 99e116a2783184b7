//! Identity provider
//!
//! Phone-number + password accounts with opaque bearer tokens. The service
//! only depends on the [`IdentityProvider`] trait. [`LocalIdentityProvider`]
//! persists accounts in the table store and keeps sessions and reset codes
//! in process, each with a TTL.

use crate::config::IdentityConfig;
use crate::errors::{AuthError, BingoError, BingoResult, StorageError, ValidationError};
use crate::store::{fetch, Collection, Record, SharedStore, WriteBatch};
use crate::wallet::codes::{generate_code, hash_code};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
const RESET_NOT_FOUND: &str = "invalid or expired reset code";

/// The signed-in user as seen by the rest of the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub phone_number: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub identity: Identity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub phone_number: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// `+` followed by 8 to 15 digits
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone
        .strip_prefix('+')
        .ok_or_else(|| ValidationError::InvalidPhone(phone.to_string()))?;
    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(phone.to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::invalid(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register and open a session
    async fn sign_up(&self, request: SignUpRequest) -> BingoResult<Session>;

    async fn sign_in(&self, phone_number: &str, password: &str) -> BingoResult<Session>;

    async fn sign_out(&self, token: &str) -> BingoResult<()>;

    /// Issue a one-time reset code for out-of-band delivery
    async fn reset_password(&self, phone_number: &str) -> BingoResult<String>;

    /// Redeem a reset code; existing sessions of the user are revoked
    async fn complete_password_reset(
        &self,
        phone_number: &str,
        code: &str,
        new_password: &str,
    ) -> BingoResult<()>;

    /// Resolve a bearer token
    async fn authenticate(&self, token: &str) -> BingoResult<Identity>;

    /// Register without opening a session (administrator-created accounts)
    async fn create_user(&self, request: SignUpRequest) -> BingoResult<Identity>;

    /// Drop an account and its sessions; used to undo a half-finished creation
    async fn remove_user(&self, phone_number: &str) -> BingoResult<()>;

    /// Forget expired sessions and reset codes; returns how many were dropped
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Stored credentials, keyed by phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAccount {
    pub phone_number: String,
    pub user_id: String,
    pub full_name: Option<String>,
    pub salt: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityAccount {
    fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            phone_number: self.phone_number.clone(),
            full_name: self.full_name.clone(),
        }
    }

    fn set_password(&mut self, password: &str) {
        self.salt = Uuid::new_v4().simple().to_string();
        self.password_hash = hash_password(&self.salt, password);
        self.updated_at = Utc::now();
    }
}

impl Record for IdentityAccount {
    const COLLECTION: Collection = Collection::Identities;

    fn id(&self) -> &str {
        &self.phone_number
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

struct SessionEntry {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

struct ResetTicket {
    code_hash: String,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

/// Accounts in the table store; tokens and reset codes in process
pub struct LocalIdentityProvider {
    store: SharedStore,
    config: IdentityConfig,
    sessions: DashMap<String, SessionEntry>,
    resets: DashMap<String, ResetTicket>,
}

impl LocalIdentityProvider {
    pub fn new(store: SharedStore, config: IdentityConfig) -> Self {
        Self {
            store,
            config,
            sessions: DashMap::new(),
            resets: DashMap::new(),
        }
    }

    async fn account(&self, phone: &str) -> BingoResult<Option<IdentityAccount>> {
        fetch::<IdentityAccount>(self.store.as_ref(), phone).await
    }

    async fn register(&self, request: SignUpRequest) -> BingoResult<Identity> {
        let phone = request.phone_number.trim().to_string();
        validate_phone(&phone)?;
        validate_password(&request.password)?;

        let now = Utc::now();
        let mut account = IdentityAccount {
            phone_number: phone.clone(),
            user_id: Uuid::new_v4().to_string(),
            full_name: request.full_name.filter(|n| !n.trim().is_empty()),
            salt: String::new(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        account.set_password(&request.password);

        let mut batch = WriteBatch::new();
        batch.put(&account)?;
        batch.expect_absent(Collection::Identities, &phone);
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StorageError::Conflict { .. }) => return Err(AuthError::AccountExists(phone).into()),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %account.user_id, "Registered account for {}", phone);
        Ok(account.identity())
    }

    fn open_session(&self, identity: Identity) -> Session {
        let access_token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            access_token.clone(),
            SessionEntry {
                identity: identity.clone(),
                expires_at: Utc::now() + ttl(self.config.session_ttl_secs),
            },
        );
        Session {
            access_token,
            identity,
        }
    }
}

/// Ten years; keeps `now + ttl` far from chrono's limits
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 3600;

fn ttl(secs: u64) -> ChronoDuration {
    ChronoDuration::seconds(i64::try_from(secs).unwrap_or(MAX_TTL_SECS).min(MAX_TTL_SECS))
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, request: SignUpRequest) -> BingoResult<Session> {
        let identity = self.register(request).await?;
        Ok(self.open_session(identity))
    }

    async fn sign_in(&self, phone_number: &str, password: &str) -> BingoResult<Session> {
        let phone = phone_number.trim();
        validate_phone(phone)?;

        let account = self
            .account(phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if hash_password(&account.salt, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials.into());
        }

        debug!(user_id = %account.user_id, "Signed in");
        Ok(self.open_session(account.identity()))
    }

    async fn sign_out(&self, token: &str) -> BingoResult<()> {
        self.sessions
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    async fn reset_password(&self, phone_number: &str) -> BingoResult<String> {
        let phone = phone_number.trim();
        validate_phone(phone)?;
        if self.account(phone).await?.is_none() {
            return Err(BingoError::not_found("no account for that phone number"));
        }

        let code = generate_code(&mut StdRng::from_entropy(), 6);
        self.resets.insert(
            phone.to_string(),
            ResetTicket {
                code_hash: hash_code(&code),
                expires_at: Utc::now() + ttl(self.config.reset_code_ttl_secs),
                attempts: 0,
            },
        );
        info!("Password reset requested for {}", phone);
        Ok(code)
    }

    async fn complete_password_reset(
        &self,
        phone_number: &str,
        code: &str,
        new_password: &str,
    ) -> BingoResult<()> {
        let phone = phone_number.trim();
        validate_password(new_password)?;

        {
            let mut ticket = self
                .resets
                .get_mut(phone)
                .ok_or_else(|| BingoError::not_found(RESET_NOT_FOUND))?;
            if ticket.expires_at <= Utc::now() {
                drop(ticket);
                self.resets.remove(phone);
                return Err(BingoError::not_found(RESET_NOT_FOUND));
            }
            if ticket.code_hash != hash_code(code) {
                ticket.attempts += 1;
                let burned = ticket.attempts >= self.config.max_reset_attempts;
                drop(ticket);
                if burned {
                    self.resets.remove(phone);
                    warn!("Reset code for {} burned after too many attempts", phone);
                }
                return Err(BingoError::not_found(RESET_NOT_FOUND));
            }
        }
        self.resets.remove(phone);

        let mut account = self
            .account(phone)
            .await?
            .ok_or_else(|| BingoError::not_found("no account for that phone number"))?;
        let previous_hash = account.password_hash.clone();
        account.set_password(new_password);

        let mut batch = WriteBatch::new();
        batch.put(&account)?;
        batch.expect(Collection::Identities, phone, "password_hash", previous_hash);
        self.store.commit(batch).await?;

        let user_id = account.user_id;
        self.sessions.retain(|_, entry| entry.identity.user_id != user_id);
        info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }

    async fn authenticate(&self, token: &str) -> BingoResult<Identity> {
        let identity = {
            let entry = self.sessions.get(token).ok_or(AuthError::NotAuthenticated)?;
            (entry.expires_at > Utc::now()).then(|| entry.identity.clone())
        };
        match identity {
            Some(identity) => Ok(identity),
            None => {
                self.sessions.remove(token);
                Err(AuthError::NotAuthenticated.into())
            }
        }
    }

    async fn create_user(&self, request: SignUpRequest) -> BingoResult<Identity> {
        self.register(request).await
    }

    async fn remove_user(&self, phone_number: &str) -> BingoResult<()> {
        let phone = phone_number.trim();
        let Some(account) = self.account(phone).await? else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        batch.delete(Collection::Identities, phone);
        self.store.commit(batch).await?;

        self.resets.remove(phone);
        self.sessions
            .retain(|_, entry| entry.identity.user_id != account.user_id);
        warn!(user_id = %account.user_id, "Removed account for {}", phone);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len() + self.resets.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        self.resets.retain(|_, ticket| ticket.expires_at > now);
        before.saturating_sub(self.sessions.len() + self.resets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TableStore};
    use std::sync::Arc;

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(Arc::new(MemoryStore::new()), IdentityConfig::default())
    }

    fn signup(phone: &str) -> SignUpRequest {
        SignUpRequest {
            phone_number: phone.to_string(),
            password: "secret1".to_string(),
            full_name: Some("Abebe Kebede".to_string()),
        }
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+251911234567").is_ok());
        assert!(validate_phone("0911234567").is_err());
        assert!(validate_phone("+2519").is_err());
        assert!(validate_phone("+25191123456a").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
    }

    #[tokio::test]
    async fn test_sign_up_sign_in_authenticate() {
        let provider = provider();
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();

        let identity = provider.authenticate(&session.access_token).await.unwrap();
        assert_eq!(identity, session.identity);

        let again = provider.sign_in("+251911234567", "secret1").await.unwrap();
        assert_eq!(again.identity.user_id, identity.user_id);
        assert_ne!(again.access_token, session.access_token);
    }

    #[tokio::test]
    async fn test_duplicate_and_bad_credentials() {
        let provider = provider();
        provider.sign_up(signup("+251911234567")).await.unwrap();

        assert!(matches!(
            provider.sign_up(signup("+251911234567")).await,
            Err(BingoError::Auth(AuthError::AccountExists(_)))
        ));
        assert!(matches!(
            provider.sign_in("+251911234567", "wrong-pass").await,
            Err(BingoError::Auth(AuthError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let provider = LocalIdentityProvider::new(store.clone(), IdentityConfig::default());
        provider.sign_up(signup("+251911234567")).await.unwrap();

        let row = store
            .get(Collection::Identities, "+251911234567")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(row["password_hash"], "secret1");
        assert_eq!(row["password_hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let provider = provider();
        let mut request = signup("+251911234567");
        request.password = "12345".to_string();
        assert!(matches!(
            provider.sign_up(request).await,
            Err(BingoError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let provider = provider();
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();
        provider.sign_out(&session.access_token).await.unwrap();
        assert!(provider.authenticate(&session.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let provider = provider();
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();

        let code = provider.reset_password("+251911234567").await.unwrap();
        assert!(provider
            .complete_password_reset("+251911234567", "000000x", "newpass1")
            .await
            .is_err());
        provider
            .complete_password_reset("+251911234567", &code, "newpass1")
            .await
            .unwrap();

        assert!(provider.authenticate(&session.access_token).await.is_err());
        assert!(provider.sign_in("+251911234567", "secret1").await.is_err());
        assert!(provider.sign_in("+251911234567", "newpass1").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_code_burns_after_attempt_limit() {
        let config = IdentityConfig {
            max_reset_attempts: 2,
            ..Default::default()
        };
        let provider = LocalIdentityProvider::new(Arc::new(MemoryStore::new()), config);
        provider.sign_up(signup("+251911234567")).await.unwrap();

        let code = provider.reset_password("+251911234567").await.unwrap();
        for _ in 0..2 {
            assert!(provider
                .complete_password_reset("+251911234567", "bad", "newpass1")
                .await
                .is_err());
        }
        // the right code no longer works once the ticket is burned
        assert!(matches!(
            provider
                .complete_password_reset("+251911234567", &code, "newpass1")
                .await,
            Err(BingoError::NotFound(_))
        ));
        assert!(provider.sign_in("+251911234567", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged() {
        let provider = provider();
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();
        provider.reset_password("+251911234567").await.unwrap();

        assert_eq!(provider.purge_expired(Utc::now()).await, 0);
        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(provider.purge_expired(later).await, 2);
        assert!(provider.authenticate(&session.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let config = IdentityConfig {
            session_ttl_secs: 1,
            ..Default::default()
        };
        let provider = LocalIdentityProvider::new(Arc::new(MemoryStore::new()), config);
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();
        assert!(provider.authenticate(&session.access_token).await.is_ok());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(matches!(
            provider.authenticate(&session.access_token).await,
            Err(BingoError::Auth(AuthError::NotAuthenticated))
        ));
    }

    #[tokio::test]
    async fn test_remove_user_frees_phone_number() {
        let provider = provider();
        let session = provider.sign_up(signup("+251911234567")).await.unwrap();

        provider.remove_user("+251911234567").await.unwrap();
        assert!(provider.authenticate(&session.access_token).await.is_err());
        assert!(provider.sign_in("+251911234567", "secret1").await.is_err());

        let again = provider.sign_up(signup("+251911234567")).await.unwrap();
        assert_ne!(again.identity.user_id, session.identity.user_id);
    }
}
