//! Wallet: amounts, transactions and the confirmation-code workflow

pub mod codes;
pub mod notifier;
pub mod types;
pub mod workflow;

pub use notifier::{CodeDelivery, CodeNotifier, LoggingNotifier};
pub use types::{AgentProfile, Amount, PaymentMethod, Transaction, TransactionStatus, TransactionType};
pub use workflow::{
    ConfirmedTransaction, DepositRequest, PendingTransaction, WalletService, WithdrawalRequest,
};
