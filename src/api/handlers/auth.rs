//! Sign-up, sign-in and password reset

use super::AppState;
use crate::api::{
    errors::{ApiError, ResultExt},
    extract::{ApiJson, CurrentUser},
    middleware::RequestId,
    models::*,
};
use crate::identity::{Session, SignUpRequest};
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::info;

async fn session_response(
    state: &AppState,
    request_id: &RequestId,
    session: Session,
) -> Result<SessionResponse, ApiError> {
    let grant = state
        .resolver
        .refresh(&session.identity)
        .await
        .or_api(request_id)?;
    Ok(SessionResponse {
        access_token: session.access_token,
        user: session.identity,
        role: grant.map(|g| g.role),
    })
}

/// POST /auth/sign-up
pub async fn sign_up_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SignUpRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.identity.sign_up(body).await.or_api(&request_id)?;
    state
        .resolver
        .bootstrap(&session.identity)
        .await
        .or_api(&request_id)?;

    let response = session_response(&state, &request_id, session).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/sign-in
pub async fn sign_in_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SignInBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .identity
        .sign_in(&body.phone_number, &body.password)
        .await
        .or_api(&request_id)?;
    Ok(Json(session_response(&state, &request_id, session).await?))
}

/// POST /auth/sign-out
pub async fn sign_out_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.identity.sign_out(&user.token).await.or_api(&request_id)?;
    state.resolver.invalidate(&user.identity.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/password-reset
pub async fn reset_password_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ResetBody>,
) -> Result<Json<ResetResponse>, ApiError> {
    let code = state
        .identity
        .reset_password(&body.phone_number)
        .await
        .or_api(&request_id)?;
    info!(phone = %body.phone_number.trim(), "📨 Password reset code {} issued", code);

    Ok(Json(ResetResponse {
        message: "A reset code has been sent to your phone".to_string(),
        reset_code: state.config.wallet.echo_confirmation_codes.then_some(code),
    }))
}

/// POST /auth/password-reset/complete
pub async fn complete_reset_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CompleteResetBody>,
) -> Result<StatusCode, ApiError> {
    state
        .identity
        .complete_password_reset(&body.phone_number, &body.code, &body.new_password)
        .await
        .or_api(&request_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
pub async fn me_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<MeResponse>, ApiError> {
    let ctx = state
        .resolver
        .context(user.identity)
        .await
        .or_api(&request_id)?;

    Ok(Json(MeResponse {
        role: ctx.grant.map(|g| g.role),
        role_source: ctx.grant.map(|g| g.source),
        is_admin: ctx.grant.is_some_and(|g| g.is_admin()),
        is_cashier: ctx.grant.is_some_and(|g| g.is_cashier()),
        dashboard: ctx.dashboard(),
        user: ctx.identity,
    }))
}
