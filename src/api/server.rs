//! API Server
//!
//! Middleware stack, background maintenance and graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, error_metrics_middleware, request_id_middleware},
    routes::create_router,
};
use crate::config::MonitoringConfig;
use axum::Router;
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle game sessions are looked for
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(monitoring: &MonitoringConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ethiobingo={},tower_http=info",
            monitoring.log_level.as_str()
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if monitoring.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        debug!("Tracing subscriber already installed");
    }
}

/// Wrap the router in the middleware stack
pub fn create_app(state: Arc<AppState>) -> Router {
    with_middleware(create_router(state.clone()), state)
}

/// Layers run outside-in: trace, request id, CORS, error envelope, timeout
pub fn with_middleware(router: Router, state: Arc<AppState>) -> Router {
    let allowed_origins = state.config.server.allowed_origins.clone();
    let timeout = state.config.request_timeout();

    router
        .layer(TimeoutLayer::new(timeout))
        // Sees timeouts, so they get the JSON envelope and are counted
        .layer(axum::middleware::from_fn_with_state(
            state,
            error_metrics_middleware,
        ))
        // CORS layer (before timeout to handle preflight)
        .layer(create_cors_layer(allowed_origins))
        // Request ID wraps everything but tracing
        .layer(axum::middleware::from_fn(request_id_middleware))
        // Tracing layer (last for complete request tracing)
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start maintenance tasks and serve until a shutdown signal
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🚀 Starting EthioBingo API Server");
        self.spawn_maintenance();
        self.run_http().await
    }

    async fn run_http(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.get_socket_addr()?;
        let app = create_app(self.state.clone());

        info!("🌐 Listen: http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ API Server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("🛑 API Server stopped gracefully");
        Ok(())
    }

    /// Expire stale pending transactions, evict idle game sessions and
    /// forget expired sign-in sessions and reset codes
    fn spawn_maintenance(&self) {
        let state = self.state.clone();
        let sweep_every = state.config.expiry_sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            loop {
                interval.tick().await;
                match state.wallet.expire_stale(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => info!("⏰ Expired {} pending transactions", n),
                    Err(e) => warn!("Expiry sweep failed: {}", e),
                }
            }
        });

        let state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EVICTION_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = state.sessions.evict_idle();
                if evicted > 0 {
                    debug!("Evicted {} idle game sessions", evicted);
                }
                let purged = state.identity.purge_expired(Utc::now()).await;
                if purged > 0 {
                    debug!("Purged {} expired sign-in sessions and reset codes", purged);
                }
            }
        });
    }

    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        let server = &self.state.config.server;
        Ok(SocketAddr::from((
            server.host.parse::<std::net::IpAddr>()?,
            server.port,
        )))
    }

    fn log_server_info(&self) {
        let config = &self.state.config;
        info!("📋 Server Configuration:");
        info!("   Node ID: {}", config.server.node_id);
        info!("   Version: {}", env!("CARGO_PKG_VERSION"));
        info!("   Storage: {:?}", config.storage.backend);
        info!("   CORS: {:?}", config.server.allowed_origins);
        info!("   Request timeout: {}s", config.server.request_timeout_secs);
        info!("   Role fallback: {:?}", config.access.fallback_policy);
        info!("   Metrics enabled: {}", self.state.metrics.is_some());
        if config.wallet.echo_confirmation_codes {
            warn!("⚠️  Confirmation codes are echoed in API responses");
        }

        info!("📊 Available endpoints:");
        info!("   GET  /health                 - Health check");
        info!("   GET  /metrics                - Prometheus metrics");
        info!("   POST /auth/sign-up|sign-in   - Identity");
        info!("   POST /games                  - New free-play session");
        info!("   POST /wallet/deposits        - Start a deposit");
        info!("   GET  /cartelas/:no/verify    - Public card check");
        info!("   *    /admin/*                - Staff dashboard");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BingoConfig;
    use crate::identity::LocalIdentityProvider;
    use crate::metrics::Metrics;
    use crate::store::{MemoryStore, SharedStore};
    use crate::wallet::LoggingNotifier;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_timeout_answers_with_envelope() {
        let mut config = BingoConfig::testing();
        config.server.request_timeout_secs = 1;
        let store: SharedStore = Arc::new(MemoryStore::new());
        let identity = LocalIdentityProvider::new(store.clone(), config.identity.clone());
        let metrics = Arc::new(Metrics::new().unwrap());
        let state = Arc::new(AppState::new(
            config,
            store,
            Arc::new(identity),
            Arc::new(LoggingNotifier),
            Some(metrics.clone()),
        ));

        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_middleware(slow, state);

        let request = Request::builder()
            .uri("/slow")
            .header("x-request-id", "slow-1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()["x-request-id"], "slow-1");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["request_id"], "slow-1");
        assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
        assert!(metrics.render().unwrap().contains("REQUEST_TIMEOUT"));
    }
}
