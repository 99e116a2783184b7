//! Staff dashboard: cartelas, groups, results, credits, accounts and roles
//!
//! Every handler takes [`Staff`]; the managers enforce the role each
//! operation needs.

use super::AppState;
use crate::access::{dashboard_sections, Role, RoleAssignment};
use crate::admin::cartelas::{GenerateCartelas, IssueCartela};
use crate::admin::{
    audit, stats, AdminAction, Cartela, CartelaFilter, CartelaGroup, NewGroup, UserType,
    VerificationResult,
};
use crate::api::{
    errors::{ApiError, ResultExt},
    extract::{ApiJson, ApiPath, ApiQuery, Staff},
    middleware::RequestId,
    models::*,
};
use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Extension, Json,
};
use std::sync::Arc;

/// GET /admin/dashboard
pub async fn dashboard_handler(
    Extension(request_id): Extension<RequestId>,
    Staff(ctx): Staff,
) -> Result<Json<DashboardResponse>, ApiError> {
    let grant = ctx
        .require_at_least(Role::Cashier)
        .map_err(|e| ApiError::from_bingo(request_id.0.clone(), e.into()))?;
    let dashboard = crate::access::DashboardKind::from_grant(&grant);

    Ok(Json(DashboardResponse {
        role: grant.role,
        dashboard,
        sections: dashboard_sections(dashboard),
    }))
}

/// GET /admin/stats
pub async fn stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
) -> Result<Json<StatsResponse>, ApiError> {
    let overview = stats::overview(&state.store, &ctx).await.or_api(&request_id)?;
    Ok(Json(overview.into()))
}

// ---- cartelas ----

/// POST /admin/cartelas
pub async fn issue_cartela_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<IssueCartela>,
) -> Result<(StatusCode, Json<Cartela>), ApiError> {
    let cartela = state.cartelas.issue(&ctx, body).await.or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(cartela)))
}

/// POST /admin/cartelas/bulk
pub async fn generate_cartelas_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<GenerateCartelas>,
) -> Result<(StatusCode, Json<Vec<Cartela>>), ApiError> {
    let cartelas = state.cartelas.generate(&ctx, body).await.or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(cartelas)))
}

/// GET /admin/cartelas?search=&status=&group_id=&limit=
pub async fn list_cartelas_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<CartelaFilter>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<Cartela>>, ApiError> {
    let cartelas = state.cartelas.list(&ctx, filter).await.or_api(&request_id)?;
    Ok(Json(cartelas))
}

/// GET /cartelas/:card_number/verify (public)
pub async fn verify_cartela_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(card_number): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<VerificationResult>, ApiError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let result = state
        .cartelas
        .verify(&card_number, user_agent)
        .await
        .or_api(&request_id)?;
    Ok(Json(result))
}

// ---- groups ----

/// POST /admin/groups
pub async fn create_group_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<NewGroup>,
) -> Result<(StatusCode, Json<CartelaGroup>), ApiError> {
    let group = state.groups.create(&ctx, body).await.or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET /admin/groups
pub async fn list_groups_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<CartelaGroup>>, ApiError> {
    let groups = state.groups.list(&ctx).await.or_api(&request_id)?;
    Ok(Json(groups))
}

/// GET /admin/groups/:group_id
pub async fn get_group_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(group_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<CartelaGroup>, ApiError> {
    ctx.require_at_least(Role::Cashier)
        .map_err(|e| ApiError::from_bingo(request_id.0.clone(), e.into()))?;
    let group = state.groups.get(&group_id).await.or_api(&request_id)?;
    Ok(Json(group))
}

// ---- results ----

/// POST /admin/results
pub async fn create_result_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<ResultBody>,
) -> Result<(StatusCode, Json<ResultView>), ApiError> {
    let result = state
        .results
        .create(&ctx, body.into())
        .await
        .or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// GET /admin/results?status=
pub async fn list_results_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ResultQuery>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<ResultView>>, ApiError> {
    let results = state
        .results
        .list(&ctx, query.status)
        .await
        .or_api(&request_id)?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

/// POST /admin/results/:result_id/publish
pub async fn publish_result_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(result_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<PublishResponse>, ApiError> {
    let outcome = state
        .results
        .publish(&ctx, &result_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(PublishResponse {
        result: outcome.result.into(),
        cartelas_checked: outcome.cartelas_checked,
        winners: outcome.winners,
    }))
}

/// POST /admin/results/:result_id/complete
pub async fn complete_result_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(result_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<ResultView>, ApiError> {
    let result = state
        .results
        .complete(&ctx, &result_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(result.into()))
}

// ---- credits ----

/// POST /admin/credits
pub async fn record_credit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<CreditBody>,
) -> Result<(StatusCode, Json<CreditView>), ApiError> {
    let entry = state
        .credits
        .record(&ctx, body.into())
        .await
        .or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// GET /admin/credits?transaction_type=
pub async fn list_credits_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<CreditQuery>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<CreditView>>, ApiError> {
    let entries = state
        .credits
        .list(&ctx, query.transaction_type)
        .await
        .or_api(&request_id)?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// POST /admin/credits/:credit_id/acknowledge
pub async fn acknowledge_credit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(credit_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<CreditView>, ApiError> {
    let entry = state
        .credits
        .acknowledge(&ctx, &credit_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(entry.into()))
}

// ---- accounts ----

/// GET /admin/account-forms
pub async fn account_forms_handler() -> Json<Vec<AccountFormView>> {
    Json(
        UserType::ALL
            .iter()
            .map(|&user_type| AccountFormView {
                user_type,
                form: user_type.form(),
            })
            .collect(),
    )
}

/// POST /admin/accounts
pub async fn create_account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<AccountBody>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let view = state
        .accounts
        .create(&ctx, body.into())
        .await
        .or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /admin/accounts?user_type=&search=
pub async fn list_accounts_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<AccountQuery>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let views = state
        .accounts
        .list(&ctx, query.user_type, query.search.as_deref())
        .await
        .or_api(&request_id)?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// GET /admin/accounts/:account_id
pub async fn get_account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(account_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<AccountResponse>, ApiError> {
    let view = state
        .accounts
        .get(&ctx, &account_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(view.into()))
}

/// GET /admin/super-agents
pub async fn super_agents_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let views = state
        .accounts
        .list_super_agents(&ctx)
        .await
        .or_api(&request_id)?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

// ---- roles and audit ----

/// POST /admin/roles
pub async fn assign_role_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Staff(ctx): Staff,
    ApiJson(body): ApiJson<RoleBody>,
) -> Result<Json<RoleChangeResponse>, ApiError> {
    let granted = state
        .resolver
        .assign_role(&ctx, &body.user_id, body.role)
        .await
        .or_api(&request_id)?;
    Ok(Json(RoleChangeResponse {
        user_id: body.user_id,
        role: body.role,
        granted,
    }))
}

/// DELETE /admin/roles/:assignment_id
pub async fn deactivate_role_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(assignment_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<RoleAssignment>, ApiError> {
    let row = state
        .resolver
        .deactivate_role(&ctx, &assignment_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(row))
}

/// GET /admin/users/:user_id/roles
pub async fn list_roles_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<String>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<RoleAssignment>>, ApiError> {
    let rows = state
        .resolver
        .list_roles(&ctx, &user_id)
        .await
        .or_api(&request_id)?;
    Ok(Json(rows))
}

/// GET /admin/audit?limit=
pub async fn audit_log_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
    Staff(ctx): Staff,
) -> Result<Json<Vec<AdminAction>>, ApiError> {
    let actions = audit::list_actions(state.store.as_ref(), &ctx, query.limit)
        .await
        .or_api(&request_id)?;
    Ok(Json(actions))
}
