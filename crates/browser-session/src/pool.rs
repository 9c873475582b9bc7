//! Bounded session pool with FIFO eviction of idle sessions (§4.2
//! `createSession`, §8 session-cap invariant).

use crate::session::{SessionLifecycle, SessionState};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Raised by [`SessionPool::try_reserve`] when the pool is full and no idle
/// session is available to evict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimit {
    /// Configured maximum concurrent sessions.
    pub max_sessions: usize,
}

impl std::fmt::Display for SessionLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session limit of {} reached with no idle session to evict", self.max_sessions)
    }
}

impl std::error::Error for SessionLimit {}

/// Aggregate pool statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions in any non-CLOSED state.
    pub open: usize,
    /// Sessions currently READY (idle, reusable).
    pub idle: usize,
    /// Configured cap.
    pub max_sessions: usize,
}

/// A bounded registry of [`SessionLifecycle`] entries keyed by session id.
///
/// Enforces `maxSessions` by evicting the longest-idle READY session (FIFO
/// by `last_used`) when a new session is requested at capacity. If no
/// session is idle, reservation fails with [`SessionLimit`].
pub struct SessionPool {
    max_sessions: usize,
    idle_eviction_after: Duration,
    entries: Mutex<BTreeMap<String, SessionLifecycle>>,
}

impl SessionPool {
    /// Create an empty pool capped at `max_sessions` concurrent open
    /// sessions. `idle_eviction_after` additionally reclaims sessions that
    /// have sat READY longer than the idle timeout even below capacity.
    #[must_use]
    pub fn new(max_sessions: usize, idle_eviction_after: Duration) -> Self {
        Self {
            max_sessions,
            idle_eviction_after,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Reserve capacity for a new session under `id`, evicting the
    /// longest-idle READY session if the pool is already full.
    pub fn try_reserve(&self, id: impl Into<String>) -> Result<(), SessionLimit> {
        let mut entries = self.entries.lock().expect("pool lock poisoned");
        if entries.len() >= self.max_sessions {
            let victim = entries
                .iter()
                .filter(|(_, s)| *s.state() == SessionState::Ready)
                .min_by_key(|(_, s)| s.last_used())
                .map(|(id, _)| id.clone());

            match victim {
                Some(victim_id) => {
                    entries.remove(&victim_id);
                }
                None => return Err(SessionLimit { max_sessions: self.max_sessions }),
            }
        }
        entries.insert(id.into(), SessionLifecycle::new());
        Ok(())
    }

    /// Run `f` against the lifecycle for `id`, if present.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut SessionLifecycle) -> R) -> Option<R> {
        let mut entries = self.entries.lock().expect("pool lock poisoned");
        entries.get_mut(id).map(f)
    }

    /// Remove a session entirely, e.g. after `close()`.
    pub fn remove(&self, id: &str) {
        self.entries.lock().expect("pool lock poisoned").remove(id);
    }

    /// Sessions that have been READY longer than `idle_eviction_after`.
    #[must_use]
    pub fn expired_idle_sessions(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("pool lock poisoned");
        let now = Instant::now();
        entries
            .iter()
            .filter(|(_, s)| {
                *s.state() == SessionState::Ready && now.duration_since(s.last_used()) > self.idle_eviction_after
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Current aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let entries = self.entries.lock().expect("pool lock poisoned");
        let open = entries.values().filter(|s| *s.state() != SessionState::Closed).count();
        let idle = entries.values().filter(|s| *s.state() == SessionState::Ready).count();
        PoolStats { open, idle, max_sessions: self.max_sessions }
    }
}
