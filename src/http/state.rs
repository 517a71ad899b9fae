use crate::session::{SessionDeps, SessionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Running sessions (session_id → controller handle)
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,

    /// Collaborators handed to every new session
    pub deps: SessionDeps,

    /// When each session was first seen completed or cancelled
    finished: Arc<RwLock<HashMap<String, Instant>>>,
}

impl AppState {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            deps,
            finished: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Forget a session, returning its handle
    pub async fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.finished.write().await.remove(session_id);
        self.sessions.write().await.remove(session_id)
    }

    /// Drop sessions that finished at least `ttl` ago
    ///
    /// A finished session stays readable (status, report) until it has been
    /// seen finished for `ttl`. Sessions whose controller is gone are dropped
    /// straight away. Returns how many sessions were removed.
    pub async fn reap_finished(&self, ttl: Duration) -> usize {
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut finished = self.finished.write().await;
            for (id, handle) in handles {
                match handle.status().await {
                    Ok(status) if status.phase.is_terminal() => {
                        let since = *finished.entry(id.clone()).or_insert(now);
                        if now.duration_since(since) >= ttl {
                            expired.push(id);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Session {} unreachable, dropping: {}", id, e);
                        expired.push(id);
                    }
                }
            }
        }

        for id in &expired {
            self.remove(id).await;
        }
        if !expired.is_empty() {
            info!("Removed {} finished session(s)", expired.len());
        }
        expired.len()
    }

    /// Periodically drop finished sessions
    pub fn spawn_reaper(&self, period: Duration, ttl: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                state.reap_finished(ttl).await;
            }
        })
    }
}
