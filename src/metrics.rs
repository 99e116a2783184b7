//! Prometheus metrics
//!
//! One registry per server; services record through an optional
//! `Arc<Metrics>` so library users without a server pay nothing.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    numbers_called: IntCounter,
    sessions_active: IntGauge,
    wallet_transactions: IntCounterVec,
    role_resolutions: IntCounterVec,
    api_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ethiobingo".to_string()), None)?;

        let numbers_called = IntCounter::new("numbers_called_total", "Bingo numbers drawn")?;
        let sessions_active = IntGauge::new("game_sessions_active", "Live game sessions")?;
        let wallet_transactions = IntCounterVec::new(
            Opts::new(
                "wallet_transactions_total",
                "Wallet transactions by type and resulting status",
            ),
            &["type", "status"],
        )?;
        let role_resolutions = IntCounterVec::new(
            Opts::new("role_resolutions_total", "Role resolutions by outcome"),
            &["outcome"],
        )?;
        let api_errors = IntCounterVec::new(
            Opts::new("api_errors_total", "API error responses by error code"),
            &["code"],
        )?;

        registry.register(Box::new(numbers_called.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(wallet_transactions.clone()))?;
        registry.register(Box::new(role_resolutions.clone()))?;
        registry.register(Box::new(api_errors.clone()))?;

        Ok(Self {
            registry,
            numbers_called,
            sessions_active,
            wallet_transactions,
            role_resolutions,
            api_errors,
        })
    }

    pub fn number_called(&self) {
        self.numbers_called.inc();
    }

    pub fn set_sessions_active(&self, count: usize) {
        self.sessions_active.set(count as i64);
    }

    pub fn wallet_transaction(&self, kind: &str, status: &str) {
        self.wallet_transactions
            .with_label_values(&[kind, status])
            .inc();
    }

    pub fn role_resolution(&self, outcome: &str) {
        self.role_resolutions.with_label_values(&[outcome]).inc();
    }

    pub fn api_error(&self, code: &str) {
        self.api_errors.with_label_values(&[code]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.number_called();
        metrics.set_sessions_active(3);
        metrics.wallet_transaction("deposit", "completed");
        metrics.role_resolution("assigned");
        metrics.api_error("VALIDATION_ERROR");

        let text = metrics.render().unwrap();
        assert!(text.contains("ethiobingo_numbers_called_total 1"));
        assert!(text.contains("ethiobingo_game_sessions_active 3"));
        assert!(text.contains("status=\"completed\""));
        assert!(text.contains("outcome=\"assigned\""));
        assert!(text.contains("code=\"VALIDATION_ERROR\""));
    }
}
