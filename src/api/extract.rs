//! Request extractors
//!
//! `CurrentUser` authenticates the bearer token; `Staff` additionally
//! resolves the role grant so admin handlers can check privileges.
//! `ApiJson`, `ApiPath` and `ApiQuery` wrap axum's extractors so malformed
//! input is answered with the JSON error envelope.

use super::errors::{ApiError, ResultExt};
use super::handlers::AppState;
use super::middleware::RequestId;
use crate::access::AccessContext;
use crate::identity::Identity;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header::AUTHORIZATION, request::Parts, Extensions},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn request_id_from(extensions: &Extensions) -> RequestId {
    extensions
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()))
}

fn request_id(parts: &Parts) -> RequestId {
    request_id_from(&parts.extensions)
}

fn rejected(request_id: RequestId, what: &str, status: u16, text: String) -> ApiError {
    ApiError::bad_request(request_id.0, format!("invalid {}: {}", what, text))
        .with_details(json!({ "rejection_status": status }))
}

/// JSON body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id_from(req.extensions());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejected(
                request_id,
                "request body",
                rejection.status().as_u16(),
                rejection.body_text(),
            )),
        }
    }
}

/// Path parameters
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(rejected(
                request_id(parts),
                "path",
                rejection.status().as_u16(),
                rejection.body_text(),
            )),
        }
    }
}

/// Query string
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(rejected(
                request_id(parts),
                "query",
                rejection.status().as_u16(),
                rejection.body_text(),
            )),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let request_id = request_id(parts);
        let token = bearer_token(parts).ok_or_else(|| {
            ApiError::unauthorized(request_id.0.clone(), "missing bearer token".to_string())
        })?;
        let identity = state.identity.authenticate(&token).await.or_api(&request_id)?;
        Ok(Self { identity, token })
    }
}

/// An authenticated caller with its resolved role
#[derive(Debug, Clone)]
pub struct Staff(pub AccessContext);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        let request_id = request_id(parts);
        let ctx = state
            .resolver
            .context(user.identity)
            .await
            .or_api(&request_id)?;
        Ok(Staff(ctx))
    }
}
