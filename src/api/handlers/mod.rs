//! Request Handlers
//!
//! Shared state plus the health and metrics endpoints; feature handlers live
//! in the submodules.

pub mod admin;
pub mod auth;
pub mod game;
pub mod wallet;

use super::{errors::ApiError, middleware::RequestId, models::HealthResponse};
use crate::access::RoleResolver;
use crate::admin::{AccountManager, CartelaManager, CreditLedger, GameResultManager, GroupManager};
use crate::config::BingoConfig;
use crate::game::SessionRegistry;
use crate::identity::IdentityProvider;
use crate::metrics::Metrics;
use crate::store::SharedStore;
use crate::wallet::{CodeNotifier, WalletService};
use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
pub struct AppState {
    pub config: BingoConfig,
    pub store: SharedStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub resolver: RoleResolver,
    pub wallet: WalletService,
    pub sessions: SessionRegistry,
    pub cartelas: CartelaManager,
    pub groups: GroupManager,
    pub results: GameResultManager,
    pub credits: CreditLedger,
    pub accounts: AccountManager,
    /// `None` when metrics are disabled
    pub metrics: Option<Arc<Metrics>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: BingoConfig,
        store: SharedStore,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn CodeNotifier>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let currency = config.wallet.currency.clone();

        let mut resolver = RoleResolver::new(store.clone(), config.access.clone(), currency.clone());
        let mut wallet = WalletService::new(store.clone(), config.wallet.clone(), notifier);
        let mut sessions = SessionRegistry::new(&config.game);
        if let Some(metrics) = &metrics {
            resolver = resolver.with_metrics(metrics.clone());
            wallet = wallet.with_metrics(metrics.clone());
            sessions = sessions.with_metrics(metrics.clone());
        }

        Self {
            cartelas: CartelaManager::new(store.clone()),
            groups: GroupManager::new(store.clone()),
            results: GameResultManager::new(store.clone()),
            credits: CreditLedger::new(store.clone()),
            accounts: AccountManager::new(store.clone(), identity.clone(), currency),
            config,
            store,
            identity,
            resolver,
            wallet,
            sessions,
            metrics,
            started_at: Instant::now(),
        }
    }
}

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        node_id: state.config.server.node_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.sessions.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Prometheus text exposition
/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.as_ref().ok_or_else(|| {
        ApiError::service_unavailable(request_id.0.clone(), "metrics are disabled".to_string())
    })?;
    let body = metrics
        .render()
        .map_err(|e| ApiError::internal_error(request_id.0.clone(), e.to_string()))?;

    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body).into_response())
}
