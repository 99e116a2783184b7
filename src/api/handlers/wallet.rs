//! Wallet: balance, deposits, withdrawals and confirmation

use super::AppState;
use crate::api::{
    errors::{ApiError, ResultExt},
    extract::{ApiJson, ApiPath, ApiQuery, CurrentUser},
    middleware::RequestId,
    models::*,
};
use crate::wallet::{PaymentMethod, PendingTransaction};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

fn pending_response(state: &AppState, pending: PendingTransaction) -> PendingResponse {
    PendingResponse {
        message: format!(
            "Transaction {} created; enter the confirmation code sent to you to complete it",
            pending.transaction.transaction_id
        ),
        transaction: pending.transaction.into(),
        confirmation_code: state
            .wallet
            .config()
            .echo_confirmation_codes
            .then_some(pending.confirmation_code),
    }
}

/// GET /wallet/balance
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.wallet.balance(&user.identity).await.or_api(&request_id)?;
    Ok(Json(BalanceResponse {
        balance,
        currency: state.wallet.config().currency.clone(),
    }))
}

/// GET /wallet/payment-methods
pub async fn payment_methods_handler() -> Json<Vec<PaymentMethodView>> {
    Json(
        PaymentMethod::ALL
            .iter()
            .map(|&m| PaymentMethodView {
                id: m,
                name: m.display_name(),
            })
            .collect(),
    )
}

/// POST /wallet/deposits
pub async fn deposit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(body): ApiJson<DepositBody>,
) -> Result<(StatusCode, Json<PendingResponse>), ApiError> {
    let pending = state
        .wallet
        .create_deposit(&user.identity, body.into())
        .await
        .or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(pending_response(&state, pending))))
}

/// POST /wallet/withdrawals
pub async fn withdrawal_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(body): ApiJson<WithdrawalBody>,
) -> Result<(StatusCode, Json<PendingResponse>), ApiError> {
    let pending = state
        .wallet
        .create_withdrawal(&user.identity, body.into())
        .await
        .or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(pending_response(&state, pending))))
}

/// POST /wallet/transactions/:transaction_id/confirm
pub async fn confirm_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(transaction_id): ApiPath<String>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<Json<ConfirmedResponse>, ApiError> {
    let confirmed = state
        .wallet
        .confirm_transaction(&user.identity, &transaction_id, &body.confirmation_code)
        .await
        .or_api(&request_id)?;
    Ok(Json(ConfirmedResponse {
        transaction: confirmed.transaction.into(),
        balance: confirmed.balance,
    }))
}

/// POST /wallet/transactions/:transaction_id/cancel
pub async fn cancel_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(transaction_id): ApiPath<String>,
    user: CurrentUser,
) -> Result<Json<TransactionView>, ApiError> {
    let cancelled = state
        .wallet
        .cancel_transaction(&user.identity, &transaction_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(cancelled.into()))
}

/// GET /wallet/transactions?limit=
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
    user: CurrentUser,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let history = state
        .wallet
        .history(&user.identity, query.limit)
        .await
        .or_api(&request_id)?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}
