//! Session registry
//!
//! Owns the collection of live sessions, keyed by session id, with explicit
//! insert on connect and remove on disconnect. Sessions hold no conversation
//! state themselves; the per-session orchestrator does.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::ServerError;

/// One live client connection.
pub struct Session {
    /// Session ID
    pub id: String,
    /// Tenant/business identifier
    pub business_id: String,
    /// End-user identifier, when the client supplied one
    pub user_id: Option<String>,
    /// Wall-clock start, for listings
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Last activity
    last_activity: RwLock<Instant>,
    /// Is active
    active: RwLock<bool>,
}

impl Session {
    fn new(id: impl Into<String>, business_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            business_id: business_id.into(),
            user_id,
            started_at: chrono::Utc::now(),
            last_activity: RwLock::new(Instant::now()),
            active: RwLock::new(true),
        }
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Check if session is expired
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }

    /// Close session
    pub fn close(&self) {
        *self.active.write() = false;
    }

    /// Is session active
    pub fn is_active(&self) -> bool {
        *self.active.read()
    }
}

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self::with_config(
            max_sessions,
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )
    }

    pub fn with_config(
        max_sessions: usize,
        session_timeout: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
            cleanup_interval,
        }
    }

    /// Create and register a session for a new connection.
    pub fn create(
        &self,
        business_id: &str,
        user_id: Option<String>,
    ) -> Result<Arc<Session>, ServerError> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            // Try to reclaim expired sessions before rejecting.
            self.cleanup_expired_internal(&mut sessions);

            if sessions.len() >= self.max_sessions {
                return Err(ServerError::Session("Max sessions reached".to_string()));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(&id, business_id, user_id));
        sessions.insert(id.clone(), session.clone());

        tracing::info!(session_id = %id, business_id, "Created session");
        Ok(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session
    pub fn remove(&self, id: &str) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.remove(id) {
            session.close();
            tracing::info!(session_id = %id, "Removed session");
        }
    }

    /// Get active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// List all session IDs
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Cleanup expired sessions
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<Session>>) {
        let timeout = self.session_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(session) = sessions.remove(&id) {
                session.close();
                tracing::info!(session_id = %id, "Expired session");
            }
        }
    }

    /// Start a background task that periodically removes expired sessions.
    ///
    /// Returns a shutdown sender; flipping it to true (or dropping it) stops
    /// the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = registry.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let before = registry.count();
                        registry.cleanup_expired();
                        let after = registry.count();
                        if before != after {
                            tracing::info!(
                                removed = before - after,
                                remaining = after,
                                "Session cleanup"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let registry = SessionRegistry::new(10);
        let session = registry.create("acme", None).unwrap();

        assert!(session.is_active());
        assert!(!session.is_expired(Duration::from_secs(60)));
        assert_eq!(session.business_id, "acme");
    }

    #[test]
    fn test_session_get_and_remove() {
        let registry = SessionRegistry::new(10);
        let session = registry.create("acme", Some("user-1".into())).unwrap();
        let id = session.id.clone();

        let retrieved = registry.get(&id).unwrap();
        assert_eq!(retrieved.user_id.as_deref(), Some("user-1"));

        registry.remove(&id);
        assert!(registry.get(&id).is_none());
        assert!(!session.is_active());
    }

    #[test]
    fn test_capacity_limit() {
        let registry = SessionRegistry::new(2);
        registry.create("a", None).unwrap();
        registry.create("b", None).unwrap();

        assert!(matches!(
            registry.create("c", None),
            Err(ServerError::Session(_))
        ));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_expired_sessions_reclaimed_at_capacity() {
        let registry =
            SessionRegistry::with_config(1, Duration::from_millis(0), Duration::from_secs(300));
        let first = registry.create("a", None).unwrap();

        // The first session is instantly expired, so the next create
        // reclaims its slot instead of rejecting.
        std::thread::sleep(Duration::from_millis(5));
        let second = registry.create("b", None).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(registry.count(), 1);
    }
}
