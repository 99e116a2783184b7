use super::session::{GameSession, SessionSnapshot};
use crate::config::GameConfig;
use crate::errors::{BingoError, BingoResult, GameError};
use crate::metrics::Metrics;
use dashmap::DashMap;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Thread-safe registry of independent game sessions
pub struct SessionRegistry {
    /// Map of session_id -> exclusively owned session
    sessions: DashMap<String, Arc<Mutex<GameSession>>>,
    /// Held across the capacity check and insert in `create`
    admission: std::sync::Mutex<()>,
    max_sessions: usize,
    idle_ttl: Duration,
    announce_for: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl SessionRegistry {
    /// Create a registry from game configuration
    pub fn new(config: &GameConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            admission: std::sync::Mutex::new(()),
            max_sessions: config.max_sessions,
            idle_ttl: Duration::from_secs(config.session_idle_secs),
            announce_for: Duration::from_millis(config.announcement_ms),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn report(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_sessions_active(self.sessions.len());
        }
    }

    /// Open a new session with a fresh card
    pub fn create(&self) -> BingoResult<SessionSnapshot> {
        let _admission = self
            .admission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.sessions.len() >= self.max_sessions {
            self.evict_idle();
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(GameError::SessionLimitReached(self.max_sessions).into());
        }

        let id = Uuid::new_v4().to_string();
        let session = GameSession::new(id.clone(), StdRng::from_entropy(), self.announce_for);
        let snapshot = session.snapshot();
        self.sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        self.report();

        debug!(session_id = %id, "Game session created");
        Ok(snapshot)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Run `op` against a session under its lock
    pub async fn with_session<T>(
        &self,
        session_id: &str,
        op: impl FnOnce(&mut GameSession) -> Result<T, GameError>,
    ) -> BingoResult<T> {
        let session = self
            .get(session_id)
            .ok_or_else(|| BingoError::not_found("game session not found"))?;
        let mut guard = session.lock().await;
        guard.touch();
        Ok(op(&mut *guard)?)
    }

    /// Record a drawn number in metrics
    pub fn number_called(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.number_called();
        }
    }

    /// Remove a session (e.g., when the player leaves)
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        self.report();
        removed
    }

    /// Drop sessions idle for longer than the TTL; busy sessions are skipped
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.idle_for() < self.idle_ttl,
            Err(_) => true,
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!("🧹 Evicted {} idle game sessions", evicted);
        }
        self.report();
        evicted
    }

    /// Get number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::GameState;

    fn config(max_sessions: usize, idle_secs: u64) -> GameConfig {
        GameConfig {
            announcement_ms: 10,
            max_sessions,
            session_idle_secs: idle_secs,
        }
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new(&config(10, 60));
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();

        registry
            .with_session(&a.session_id, |s| Ok(s.start()))
            .await
            .unwrap();
        registry
            .with_session(&a.session_id, |s| s.call_next())
            .await
            .unwrap();

        let snap_b = registry
            .with_session(&b.session_id, |s| Ok(s.snapshot()))
            .await
            .unwrap();
        assert_eq!(snap_b.state, GameState::Idle);
        assert_eq!(snap_b.remaining, 75);
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let registry = SessionRegistry::new(&config(10, 60));
        let err = registry
            .with_session("nope", |s| Ok(s.state()))
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_game_errors_pass_through() {
        let registry = SessionRegistry::new(&config(10, 60));
        let snap = registry.create().unwrap();
        let err = registry
            .with_session(&snap.session_id, |s| s.call_next())
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::Game(GameError::NotActive)));
    }

    #[test]
    fn test_limit_and_eviction() {
        let registry = SessionRegistry::new(&config(2, 3600));
        registry.create().unwrap();
        registry.create().unwrap();
        assert!(matches!(
            registry.create(),
            Err(BingoError::Game(GameError::SessionLimitReached(2)))
        ));

        let eager = SessionRegistry::new(&config(2, 0));
        eager.create().unwrap();
        eager.create().unwrap();
        assert!(eager.create().is_ok());
        assert_eq!(eager.len(), 1);
    }

    #[test]
    fn test_parallel_creates_respect_limit() {
        let registry = SessionRegistry::new(&config(10, 3600));
        let created: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..5).filter(|_| registry.create().is_ok()).count()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(created, 10);
        assert_eq!(registry.len(), 10);
    }
}
