//! End-to-end wallet workflow over the in-memory store

use ethiobingo::config::WalletConfig;
use ethiobingo::errors::{BingoError, ValidationError};
use ethiobingo::identity::Identity;
use ethiobingo::store::{MemoryStore, SharedStore};
use ethiobingo::wallet::{
    Amount, DepositRequest, LoggingNotifier, PaymentMethod, TransactionStatus, WalletService,
    WithdrawalRequest,
};
use std::sync::Arc;

fn wallet() -> WalletService {
    let store: SharedStore = Arc::new(MemoryStore::new());
    WalletService::new(store, WalletConfig::default(), Arc::new(LoggingNotifier))
}

fn player() -> Identity {
    Identity {
        user_id: "player-1".to_string(),
        phone_number: "+251922000111".to_string(),
        full_name: Some("Tigist".to_string()),
    }
}

fn deposit(amount: f64) -> DepositRequest {
    DepositRequest {
        amount: Amount::from_decimal(amount).unwrap(),
        payment_method: PaymentMethod::Cbe,
        phone_number: "+251922000111".to_string(),
    }
}

fn withdrawal(amount: f64) -> WithdrawalRequest {
    WithdrawalRequest {
        amount: Amount::from_decimal(amount).unwrap(),
        payment_method: PaymentMethod::Awash,
        account_number: "1000234567".to_string(),
    }
}

async fn fund(wallet: &WalletService, who: &Identity, amount: f64) {
    let pending = wallet.create_deposit(who, deposit(amount)).await.unwrap();
    wallet
        .confirm_transaction(who, &pending.transaction.transaction_id, &pending.confirmation_code)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deposit_confirms_exactly_once() {
    let wallet = wallet();
    let who = player();

    let pending = wallet.create_deposit(&who, deposit(25.0)).await.unwrap();
    assert_eq!(pending.transaction.status, TransactionStatus::Pending);
    assert_eq!(wallet.balance(&who).await.unwrap(), Amount::ZERO);

    let confirmed = wallet
        .confirm_transaction(&who, &pending.transaction.transaction_id, &pending.confirmation_code)
        .await
        .unwrap();
    assert_eq!(confirmed.transaction.status, TransactionStatus::Completed);
    assert_eq!(confirmed.balance, Amount::from_major(25));

    let again = wallet
        .confirm_transaction(&who, &pending.transaction.transaction_id, &pending.confirmation_code)
        .await;
    match again {
        Err(BingoError::NotFound(message)) => {
            assert_eq!(message, "invalid confirmation code or transaction not found")
        }
        other => panic!("expected NotFound, got {:?}", other.map(|c| c.transaction.status)),
    }
    assert_eq!(wallet.balance(&who).await.unwrap(), Amount::from_major(25));
}

#[tokio::test]
async fn test_deposit_minimum_boundary() {
    let wallet = wallet();
    let who = player();

    assert!(wallet.create_deposit(&who, deposit(10.0)).await.is_ok());
    assert!(matches!(
        wallet.create_deposit(&who, deposit(9.99)).await,
        Err(BingoError::Validation(ValidationError::AmountBelowMinimum { .. }))
    ));
}

#[tokio::test]
async fn test_withdrawal_balance_boundary() {
    let wallet = wallet();
    let who = player();
    fund(&wallet, &who, 100.0).await;

    assert!(matches!(
        wallet.create_withdrawal(&who, withdrawal(100.01)).await,
        Err(BingoError::Validation(ValidationError::InsufficientBalance { .. }))
    ));

    let pending = wallet.create_withdrawal(&who, withdrawal(100.0)).await.unwrap();
    let confirmed = wallet
        .confirm_transaction(&who, &pending.transaction.transaction_id, &pending.confirmation_code)
        .await
        .unwrap();
    assert_eq!(confirmed.balance, Amount::ZERO);
}

#[tokio::test]
async fn test_other_user_cannot_confirm() {
    let wallet = wallet();
    let who = player();
    let intruder = Identity {
        user_id: "player-2".to_string(),
        phone_number: "+251922000222".to_string(),
        full_name: None,
    };

    let pending = wallet.create_deposit(&who, deposit(50.0)).await.unwrap();
    assert!(matches!(
        wallet
            .confirm_transaction(
                &intruder,
                &pending.transaction.transaction_id,
                &pending.confirmation_code
            )
            .await,
        Err(BingoError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let wallet = wallet();
    let who = player();
    for amount in [10.0, 20.0, 30.0] {
        wallet.create_deposit(&who, deposit(amount)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let history = wallet.history(&who, Some(2)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, Amount::from_major(30));
    assert_eq!(history[1].amount, Amount::from_major(20));
}

async fn race_confirms(first: Arc<WalletService>, second: Arc<WalletService>) {
    let who = player();
    let pending = first.create_deposit(&who, deposit(40.0)).await.unwrap();
    let txn_id = pending.transaction.transaction_id.clone();
    let code = pending.confirmation_code.clone();

    let confirm = |service: Arc<WalletService>| {
        let who = who.clone();
        let txn_id = txn_id.clone();
        let code = code.clone();
        tokio::spawn(async move { service.confirm_transaction(&who, &txn_id, &code).await })
    };
    let (a, b) = tokio::join!(confirm(first.clone()), confirm(second));
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Err(BingoError::NotFound(_)))));
    assert_eq!(first.balance(&who).await.unwrap(), Amount::from_major(40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_credit_once() {
    let service = Arc::new(wallet());
    race_confirms(service.clone(), service).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirms_from_two_services_credit_once() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let service = || {
        Arc::new(WalletService::new(
            store.clone(),
            WalletConfig::default(),
            Arc::new(LoggingNotifier),
        ))
    };
    race_confirms(service(), service()).await;
}
