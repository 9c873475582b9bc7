//! Per-session state machine (§4.2).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Lifecycle state of a browser session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// The browser context is being allocated.
    Initializing,
    /// Idle and available for the next operation.
    Ready,
    /// A `navigate` is in flight.
    Navigating,
    /// An `act` is in flight.
    Acting,
    /// An unrecoverable driver error occurred. Terminal except for `close`.
    Failed,
    /// Torn down. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Navigating => "navigating",
            Self::Acting => "acting",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Record of a single state transition, for diagnostics and evidence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionTransition {
    /// State before the transition.
    pub from: SessionState,
    /// State after the transition.
    pub to: SessionState,
    /// RFC 3339 timestamp of the transition.
    pub timestamp: String,
    /// Optional human-readable reason, e.g. a driver error message.
    pub reason: Option<String>,
}

/// Raised when a requested transition is not permitted from the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidTransition {
    /// State the session was in.
    pub from: SessionState,
    /// State that was requested.
    pub to: SessionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session transition from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Enforces the session state machine: `INITIALIZING -> READY -> {NAVIGATING,
/// ACTING} -> READY -> ...`, any state `-> FAILED`, `READY -> CLOSED` only
/// via an explicit close. Operations on one session are serialized by the
/// caller holding `&mut` (or an async mutex) around this manager; distinct
/// sessions may progress in parallel.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
    history: Vec<SessionTransition>,
    created_at: Instant,
    last_used: Instant,
}

impl SessionLifecycle {
    /// Start a new lifecycle in `INITIALIZING`.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: SessionState::Initializing,
            history: Vec::new(),
            created_at: now,
            last_used: now,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// When this session was created.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When this session was last transitioned.
    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Full transition history, for evidence attachment.
    #[must_use]
    pub fn history(&self) -> &[SessionTransition] {
        &self.history
    }

    /// Returns `true` if the session is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Failed | SessionState::Closed)
    }

    fn can_transition(&self, to: &SessionState) -> bool {
        if *to == SessionState::Failed {
            return !self.is_terminal();
        }
        matches!(
            (&self.state, to),
            (SessionState::Initializing, SessionState::Ready)
                | (SessionState::Ready, SessionState::Navigating)
                | (SessionState::Ready, SessionState::Acting)
                | (SessionState::Navigating, SessionState::Ready)
                | (SessionState::Acting, SessionState::Ready)
                | (SessionState::Ready, SessionState::Closed)
        )
    }

    /// Attempt a transition, recording it in history on success.
    pub fn transition(&mut self, to: SessionState, reason: Option<String>) -> Result<(), InvalidTransition> {
        if !self.can_transition(&to) {
            return Err(InvalidTransition { from: self.state.clone(), to });
        }
        let from = self.state.clone();
        self.state = to.clone();
        self.last_used = Instant::now();
        self.history.push(SessionTransition {
            from,
            to,
            timestamp: chrono::Utc::now().to_rfc3339(),
            reason,
        });
        Ok(())
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut s = SessionLifecycle::new();
        s.transition(SessionState::Ready, None).unwrap();
        s.transition(SessionState::Navigating, None).unwrap();
        s.transition(SessionState::Ready, None).unwrap();
        s.transition(SessionState::Acting, None).unwrap();
        s.transition(SessionState::Ready, None).unwrap();
        assert_eq!(*s.state(), SessionState::Ready);
        assert_eq!(s.history().len(), 5);
    }

    #[test]
    fn any_state_can_fail() {
        let mut s = SessionLifecycle::new();
        s.transition(SessionState::Ready, None).unwrap();
        s.transition(SessionState::Navigating, None).unwrap();
        s.transition(SessionState::Failed, Some("driver crashed".to_string())).unwrap();
        assert_eq!(*s.state(), SessionState::Failed);
        assert!(s.is_terminal());
    }

    #[test]
    fn close_only_from_ready() {
        let mut s = SessionLifecycle::new();
        assert!(s.transition(SessionState::Closed, None).is_err());
        s.transition(SessionState::Ready, None).unwrap();
        assert!(s.transition(SessionState::Closed, None).is_ok());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut s = SessionLifecycle::new();
        s.transition(SessionState::Ready, None).unwrap();
        s.transition(SessionState::Closed, None).unwrap();
        assert!(s.transition(SessionState::Ready, None).is_err());
        assert!(s.transition(SessionState::Failed, None).is_err());
    }

    #[test]
    fn navigate_redirect_out_of_scope_leaves_ready_or_failed_never_navigating() {
        // Mirrors the "scope on redirect" invariant: a caller that detects an
        // out-of-scope redirect mid-navigate must transition back to READY
        // (treat as a recoverable ScopeViolation) or FAILED, never leave the
        // session parked in NAVIGATING.
        let mut s = SessionLifecycle::new();
        s.transition(SessionState::Ready, None).unwrap();
        s.transition(SessionState::Navigating, None).unwrap();
        s.transition(SessionState::Ready, Some("ScopeViolation on redirect".to_string())).unwrap();
        assert_eq!(*s.state(), SessionState::Ready);
    }
}
