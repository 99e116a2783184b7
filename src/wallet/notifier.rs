//! Out-of-band delivery of confirmation codes

use crate::errors::BingoResult;
use crate::wallet::types::{Amount, TransactionType};
use async_trait::async_trait;
use tracing::info;

/// What a notifier needs to reach the user
#[derive(Debug, Clone)]
pub struct CodeDelivery {
    pub user_id: String,
    pub phone_number: Option<String>,
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub code: String,
}

#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn deliver(&self, delivery: &CodeDelivery) -> BingoResult<()>;
}

/// Writes codes to the log; stands in for an SMS gateway
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl CodeNotifier for LoggingNotifier {
    async fn deliver(&self, delivery: &CodeDelivery) -> BingoResult<()> {
        info!(
            user_id = %delivery.user_id,
            transaction_id = %delivery.transaction_id,
            kind = delivery.transaction_type.as_str(),
            amount = %delivery.amount,
            phone = delivery.phone_number.as_deref().unwrap_or("-"),
            "📨 Confirmation code {} issued",
            delivery.code
        );
        Ok(())
    }
}
