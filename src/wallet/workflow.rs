//! Deposit / withdrawal workflow
//!
//! Requests are persisted as `pending` with a hashed confirmation code.
//! Confirmation flips the status and moves the balance in one conditional
//! batch: the batch only commits if the transaction is still pending and the
//! balance has not moved since it was read.

use crate::config::WalletConfig;
use crate::errors::{BingoError, BingoResult, StorageError, ValidationError};
use crate::identity::{validate_phone, Identity};
use crate::metrics::Metrics;
use crate::store::{
    fetch, procedures, select, select_one, Collection, Order, Query, SharedStore, WriteBatch,
};
use crate::wallet::codes::{generate_code, hash_code};
use crate::wallet::notifier::{CodeDelivery, CodeNotifier};
use crate::wallet::types::{
    AgentProfile, Amount, PaymentMethod, Transaction, TransactionStatus, TransactionType,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const CONFIRM_NOT_FOUND: &str = "invalid confirmation code or transaction not found";

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub account_number: String,
}

/// A freshly created pending transaction and its plaintext code
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub transaction: Transaction,
    pub confirmation_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedTransaction {
    pub transaction: Transaction,
    pub balance: Amount,
}

pub struct WalletService {
    store: SharedStore,
    config: WalletConfig,
    notifier: Arc<dyn CodeNotifier>,
    confirm_lock: Mutex<()>,
    metrics: Option<Arc<Metrics>>,
}

impl WalletService {
    pub fn new(store: SharedStore, config: WalletConfig, notifier: Arc<dyn CodeNotifier>) -> Self {
        Self {
            store,
            config,
            notifier,
            confirm_lock: Mutex::new(()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    fn record(&self, kind: TransactionType, status: TransactionStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.wallet_transaction(kind.as_str(), status.as_str());
        }
    }

    pub async fn create_deposit(
        &self,
        identity: &Identity,
        request: DepositRequest,
    ) -> BingoResult<PendingTransaction> {
        if request.amount < self.config.min_deposit {
            return Err(ValidationError::AmountBelowMinimum {
                amount: request.amount.to_string(),
                minimum: self.config.min_deposit.to_string(),
            }
            .into());
        }
        let phone = request.phone_number.trim().to_string();
        validate_phone(&phone)?;

        self.create_pending(
            identity,
            TransactionType::Deposit,
            request.amount,
            request.payment_method,
            Some(phone),
            None,
        )
        .await
    }

    pub async fn create_withdrawal(
        &self,
        identity: &Identity,
        request: WithdrawalRequest,
    ) -> BingoResult<PendingTransaction> {
        if request.amount < self.config.min_withdrawal {
            return Err(ValidationError::AmountBelowMinimum {
                amount: request.amount.to_string(),
                minimum: self.config.min_withdrawal.to_string(),
            }
            .into());
        }
        let account = request.account_number.trim().to_string();
        if account.is_empty() {
            return Err(ValidationError::MissingField("account_number".to_string()).into());
        }

        let available = self.balance(identity).await?;
        if request.amount > available {
            return Err(ValidationError::InsufficientBalance {
                requested: request.amount.to_string(),
                available: available.to_string(),
            }
            .into());
        }

        self.create_pending(
            identity,
            TransactionType::Withdrawal,
            request.amount,
            request.payment_method,
            Some(identity.phone_number.clone()),
            Some(account),
        )
        .await
    }

    async fn create_pending(
        &self,
        identity: &Identity,
        kind: TransactionType,
        amount: Amount,
        method: PaymentMethod,
        phone_number: Option<String>,
        account_number: Option<String>,
    ) -> BingoResult<PendingTransaction> {
        let now = Utc::now();
        let (transaction_id, code) = {
            let mut rng = StdRng::from_entropy();
            (
                procedures::generate_transaction_id(&mut rng, now),
                generate_code(&mut rng, self.config.confirmation_code_digits),
            )
        };

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            transaction_id,
            transaction_type: kind,
            status: TransactionStatus::Pending,
            amount,
            currency: self.config.currency.clone(),
            payment_method: Some(method),
            phone_number,
            account_number,
            confirmation_code_hash: Some(hash_code(&code)),
            description: Some(format!(
                "{} via {}",
                match kind {
                    TransactionType::Withdrawal => "Withdrawal",
                    _ => "Deposit",
                },
                method.display_name()
            )),
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.put(&transaction)?;
        self.store.commit(batch).await?;

        info!(
            user_id = %identity.user_id,
            transaction_id = %transaction.transaction_id,
            amount = %amount,
            "💳 {} request created",
            kind.as_str()
        );
        self.record(kind, TransactionStatus::Pending);

        self.notifier
            .deliver(&CodeDelivery {
                user_id: identity.user_id.clone(),
                phone_number: transaction.phone_number.clone(),
                transaction_id: transaction.transaction_id.clone(),
                transaction_type: kind,
                amount,
                code: code.clone(),
            })
            .await?;

        Ok(PendingTransaction {
            transaction,
            confirmation_code: code,
        })
    }

    async fn load_profile(&self, identity: &Identity) -> BingoResult<AgentProfile> {
        let mut profile = AgentProfile::new(&identity.user_id, &self.config.currency);
        profile.full_name = identity.full_name.clone();
        profile.phone_number = Some(identity.phone_number.clone());

        let (profile, _) = procedures::ensure_agent_profile(self.store.as_ref(), profile).await?;
        Ok(profile)
    }

    /// Complete a pending transaction presenting its confirmation code
    pub async fn confirm_transaction(
        &self,
        identity: &Identity,
        transaction_id: &str,
        code: &str,
    ) -> BingoResult<ConfirmedTransaction> {
        let _guard = self.confirm_lock.lock().await;

        let pending: Option<Transaction> = select_one(
            self.store.as_ref(),
            Query::of::<Transaction>()
                .eq("user_id", &identity.user_id)
                .eq("transaction_id", transaction_id.trim())
                .eq("status", TransactionStatus::Pending)
                .eq("confirmation_code_hash", hash_code(code)),
        )
        .await?;
        let mut transaction = pending.ok_or_else(|| BingoError::not_found(CONFIRM_NOT_FOUND))?;

        let mut profile = self.load_profile(identity).await?;
        let previous_balance = profile.balance;
        profile.balance = procedures::balance_after(
            previous_balance,
            transaction.amount,
            transaction.transaction_type,
        )?;

        let now = Utc::now();
        profile.updated_at = now;
        transaction.status = TransactionStatus::Completed;
        transaction.completed_at = Some(now);
        transaction.updated_at = now;

        let mut batch = WriteBatch::new();
        batch
            .expect(
                Collection::Transactions,
                &transaction.id,
                "status",
                TransactionStatus::Pending,
            )
            .expect(Collection::Agents, &profile.id, "balance", previous_balance);
        batch.put(&transaction)?.put(&profile)?;

        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StorageError::Conflict { field, .. }) if field == "status" => {
                return Err(BingoError::not_found(CONFIRM_NOT_FOUND));
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            user_id = %identity.user_id,
            transaction_id = %transaction.transaction_id,
            balance = %profile.balance,
            "✅ {} confirmed",
            transaction.transaction_type.as_str()
        );
        self.record(transaction.transaction_type, TransactionStatus::Completed);

        Ok(ConfirmedTransaction {
            transaction,
            balance: profile.balance,
        })
    }

    /// Pending → cancelled, by the owner
    pub async fn cancel_transaction(
        &self,
        identity: &Identity,
        transaction_id: &str,
    ) -> BingoResult<Transaction> {
        let pending: Option<Transaction> = select_one(
            self.store.as_ref(),
            Query::of::<Transaction>()
                .eq("user_id", &identity.user_id)
                .eq("transaction_id", transaction_id.trim())
                .eq("status", TransactionStatus::Pending),
        )
        .await?;
        let mut transaction =
            pending.ok_or_else(|| BingoError::not_found("pending transaction not found"))?;

        transaction.status = TransactionStatus::Cancelled;
        transaction.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.expect(
            Collection::Transactions,
            &transaction.id,
            "status",
            TransactionStatus::Pending,
        );
        batch.put(&transaction)?;
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StorageError::Conflict { .. }) => {
                return Err(BingoError::not_found("pending transaction not found"));
            }
            Err(e) => return Err(e.into()),
        }

        info!(transaction_id = %transaction.transaction_id, "Transaction cancelled");
        self.record(transaction.transaction_type, TransactionStatus::Cancelled);
        Ok(transaction)
    }

    /// Fail every pending transaction older than the configured TTL
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> BingoResult<usize> {
        let cutoff = now - ChronoDuration::seconds(self.config.pending_ttl_secs as i64);
        let pending: Vec<Transaction> = select(
            self.store.as_ref(),
            &Query::of::<Transaction>().eq("status", TransactionStatus::Pending),
        )
        .await?;

        let mut expired = 0;
        for mut transaction in pending.into_iter().filter(|t| t.created_at < cutoff) {
            transaction.status = TransactionStatus::Failed;
            transaction.updated_at = now;
            if let Some(meta) = transaction.metadata.as_object_mut() {
                meta.insert("expired".to_string(), serde_json::Value::Bool(true));
            } else {
                transaction.metadata = serde_json::json!({ "expired": true });
            }

            let mut batch = WriteBatch::new();
            batch.expect(
                Collection::Transactions,
                &transaction.id,
                "status",
                TransactionStatus::Pending,
            );
            batch.put(&transaction)?;

            match self.store.commit(batch).await {
                Ok(()) => {
                    expired += 1;
                    self.record(transaction.transaction_type, TransactionStatus::Failed);
                }
                // confirmed or cancelled since the scan
                Err(StorageError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if expired > 0 {
            warn!("⏰ Expired {} stale pending transactions", expired);
        } else {
            debug!("No stale pending transactions");
        }
        Ok(expired)
    }

    pub async fn balance(&self, identity: &Identity) -> BingoResult<Amount> {
        Ok(fetch::<AgentProfile>(self.store.as_ref(), &identity.user_id)
            .await?
            .map(|p| p.balance)
            .unwrap_or(Amount::ZERO))
    }

    /// Newest first
    pub async fn history(
        &self,
        identity: &Identity,
        limit: Option<usize>,
    ) -> BingoResult<Vec<Transaction>> {
        select(
            self.store.as_ref(),
            &Query::of::<Transaction>()
                .eq("user_id", &identity.user_id)
                .order_by("created_at", Order::Desc)
                .limit(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TableStore};
    use crate::wallet::notifier::LoggingNotifier;

    fn service() -> (WalletService, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let service = WalletService::new(
            store.clone(),
            WalletConfig::default(),
            Arc::new(LoggingNotifier),
        );
        (service, store)
    }

    fn user() -> Identity {
        Identity {
            user_id: "u1".to_string(),
            phone_number: "+251911234567".to_string(),
            full_name: Some("Almaz".to_string()),
        }
    }

    fn deposit(cents: i64) -> DepositRequest {
        DepositRequest {
            amount: Amount::from_cents(cents),
            payment_method: PaymentMethod::Telebirr,
            phone_number: "+251911234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deposit_requires_valid_phone() {
        let (wallet, store) = service();
        let mut request = deposit(1000);
        request.phone_number = "0911234567".to_string();

        assert!(matches!(
            wallet.create_deposit(&user(), request).await,
            Err(BingoError::Validation(ValidationError::InvalidPhone(_)))
        ));
        assert!(store.scan(Collection::Transactions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_row_never_stores_plaintext_code() {
        let (wallet, store) = service();
        let pending = wallet.create_deposit(&user(), deposit(1000)).await.unwrap();

        let row = store
            .get(Collection::Transactions, &pending.transaction.id)
            .await
            .unwrap()
            .unwrap();
        let text = row.to_string();
        assert!(!text.contains(&format!("\"{}\"", pending.confirmation_code)));
        assert_eq!(row["status"], "pending");
        assert_eq!(row["type"], "deposit");
    }

    #[tokio::test]
    async fn test_wrong_code_leaves_transaction_pending() {
        let (wallet, _) = service();
        let pending = wallet.create_deposit(&user(), deposit(1000)).await.unwrap();
        let wrong = if pending.confirmation_code == "000000" { "111111" } else { "000000" };

        let err = wallet
            .confirm_transaction(&user(), &pending.transaction.transaction_id, wrong)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), CONFIRM_NOT_FOUND);
        assert_eq!(wallet.balance(&user()).await.unwrap(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_cancel_then_confirm_fails() {
        let (wallet, _) = service();
        let pending = wallet.create_deposit(&user(), deposit(2500)).await.unwrap();
        let id = pending.transaction.transaction_id.clone();

        let cancelled = wallet.cancel_transaction(&user(), &id).await.unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert!(wallet
            .confirm_transaction(&user(), &id, &pending.confirmation_code)
            .await
            .is_err());
        assert!(wallet.cancel_transaction(&user(), &id).await.is_err());
    }

    #[tokio::test]
    async fn test_expire_stale_marks_failed() {
        let (wallet, _) = service();
        let pending = wallet.create_deposit(&user(), deposit(1000)).await.unwrap();

        assert_eq!(wallet.expire_stale(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + ChronoDuration::seconds(wallet.config().pending_ttl_secs as i64 + 1);
        assert_eq!(wallet.expire_stale(later).await.unwrap(), 1);

        let history = wallet.history(&user(), None).await.unwrap();
        assert_eq!(history[0].status, TransactionStatus::Failed);
        assert_eq!(history[0].metadata["expired"], true);
        assert!(wallet
            .confirm_transaction(
                &user(),
                &pending.transaction.transaction_id,
                &pending.confirmation_code
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_withdrawal_that_overdraws_at_confirm_stays_pending() {
        let (wallet, _) = service();
        let me = user();

        let dep = wallet.create_deposit(&me, deposit(10_000)).await.unwrap();
        wallet
            .confirm_transaction(&me, &dep.transaction.transaction_id, &dep.confirmation_code)
            .await
            .unwrap();

        let request = || WithdrawalRequest {
            amount: Amount::from_major(80),
            payment_method: PaymentMethod::Cbe,
            account_number: "1000123456789".to_string(),
        };
        let first = wallet.create_withdrawal(&me, request()).await.unwrap();
        let second = wallet.create_withdrawal(&me, request()).await.unwrap();

        wallet
            .confirm_transaction(&me, &first.transaction.transaction_id, &first.confirmation_code)
            .await
            .unwrap();
        let err = wallet
            .confirm_transaction(&me, &second.transaction.transaction_id, &second.confirmation_code)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BingoError::Validation(ValidationError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.balance(&me).await.unwrap(), Amount::from_major(20));

        let history = wallet.history(&me, None).await.unwrap();
        let still_pending = history
            .iter()
            .find(|t| t.transaction_id == second.transaction.transaction_id)
            .unwrap();
        assert_eq!(still_pending.status, TransactionStatus::Pending);
    }
}
