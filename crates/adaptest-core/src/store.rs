//! Process-wide registry of quiz sessions.
//!
//! # Locking
//!
//! - The id → session map sits behind one `std::sync::Mutex`, held only for
//!   short, non-async critical sections (insert, lookup, remove, sweep).
//! - Each session has its own `tokio::sync::Mutex`, held by a request for
//!   the whole read-evaluate-commit cycle. Requests for different sessions
//!   never contend; requests for the same session are serialized.
//! - The sweeper skips sessions whose lock is held: an in-flight request is
//!   activity, so such a session cannot be idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{QuizError, QuizResult};
use crate::model::SessionId;
use crate::session::Session;

/// Default inactivity threshold before a session expires: one hour.
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 60 * 60;

/// Default interval between expiry sweeps: five minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Shared, individually locked session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Registry of live sessions with expiry.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    inactivity_timeout: Duration,
    /// 0 = unlimited
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            inactivity_timeout,
            max_sessions: 0,
        }
    }

    /// Cap the number of concurrently stored sessions.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    fn map(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        // The map holds no invariants a panicking holder could break.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session and return its handle.
    pub fn create(&self, session: Session) -> QuizResult<SessionHandle> {
        let id = session.id();
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        let mut map = self.map();

        if self.max_sessions > 0 && map.len() >= self.max_sessions {
            let now = Utc::now();
            map.retain(|_, h| !is_idle(h, now, self.inactivity_timeout));
            if map.len() >= self.max_sessions {
                return Err(QuizError::invalid_state(format!(
                    "maximum session limit ({}) reached",
                    self.max_sessions
                )));
            }
        }

        map.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Look up a live session.
    pub fn get(&self, id: SessionId) -> QuizResult<SessionHandle> {
        self.get_at(id, Utc::now())
    }

    /// Look up a live session as of `now`.
    ///
    /// An expired session is treated as absent and removed on the spot.
    pub fn get_at(&self, id: SessionId, now: DateTime<Utc>) -> QuizResult<SessionHandle> {
        let mut map = self.map();
        let handle = map.get(&id).cloned().ok_or(QuizError::NotFound(id))?;
        if is_idle(&handle, now, self.inactivity_timeout) {
            map.remove(&id);
            tracing::info!(session = %id, "session expired on lookup");
            return Err(QuizError::NotFound(id));
        }
        Ok(handle)
    }

    /// Remove a session, returning its handle if it was present.
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.map().remove(&id)
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.map();
        let before = map.len();
        map.retain(|id, handle| {
            let expired = is_idle(handle, now, self.inactivity_timeout);
            if expired {
                tracing::info!(session = %id, "cleaned up expired session");
            }
            !expired
        });
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.map().contains_key(&id)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_INACTIVITY_TIMEOUT_SECS as i64))
    }
}

/// A session is idle only if nobody holds its lock and it has expired.
fn is_idle(handle: &SessionHandle, now: DateTime<Utc>, threshold: Duration) -> bool {
    match handle.try_lock() {
        Ok(session) => session.is_expired(now, threshold),
        Err(_) => false,
    }
}

/// Start the periodic expiry sweep. Stops when `cancel` is cancelled.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    interval: StdDuration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        tracing::info!(interval_secs = interval.as_secs(), "session sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep_expired(Utc::now());
                    if removed > 0 {
                        tracing::info!(removed, remaining = store.len(), "removed expired sessions");
                    }
                }
            }
        }
    })
}
