//! The `BrowserSessionCore` facade (§4.2's public contract).

use crate::driver::{ActOutcome, BrowserDriver, NavigateOutcome, ProxyConnectionError, SessionOptions};
use crate::oracle::{
    parse_action_response, parse_extraction_response, truncate, ActionRequest, ExtractionRequest,
    OracleError, PageOracle, MAX_ACTION_CHARS, MAX_EXTRACTION_CHARS,
};
use crate::pool::{SessionLimit, SessionPool};
use crate::session::SessionState;
use crate::xss::{probe_field, Payload, ProbeReport};
use scope_guard::{OutOfScope, ScopeGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Errors raised by [`BrowserSessionCore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `maxSessions` reached with no idle session to evict.
    #[error(transparent)]
    SessionLimit(#[from] SessionLimit),
    /// `createSession` could not reach the interception proxy.
    #[error(transparent)]
    ProxyConnection(#[from] ProxyConnectionError),
    /// A target failed Scope Guard validation.
    #[error(transparent)]
    OutOfScope(#[from] OutOfScope),
    /// A redirect (or the initial navigation) landed outside scope.
    #[error("navigation to '{target}' left scope at '{redirect_target}': {reason}")]
    ScopeViolation {
        /// The originally requested target.
        target: String,
        /// The hop that was out of scope.
        redirect_target: String,
        /// Why Scope Guard rejected it.
        reason: String,
    },
    /// The budget ledger rejected a `consume` call.
    #[error(transparent)]
    Budget(#[from] scope_guard::BudgetExceeded),
    /// The oracle returned a response that did not conform to the expected
    /// shape.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// No session exists with the given id, or it is in a terminal state.
    #[error("no usable session '{0}'")]
    UnknownSession(String),
    /// An underlying driver operation failed.
    #[error("driver error: {0}")]
    Driver(#[source] anyhow::Error),
    /// A suspension point (navigate, act, extract, probe) exceeded
    /// `constraints.timeouts.totalMs`.
    #[error(transparent)]
    Timeout(#[from] pentest_error::PentestError),
    /// A suspension point was aborted by the engagement's shared
    /// cancellation token before it could complete.
    #[error("{0}")]
    Cancelled(pentest_error::PentestError),
}

struct SessionEntry {
    driver: Arc<dyn BrowserDriver>,
}

/// Orchestrates a bounded pool of proxy-pinned browser sessions, gated on
/// every side-effecting call by a [`ScopeGuard`].
pub struct BrowserSessionCore {
    scope_guard: Arc<ScopeGuard>,
    pool: SessionPool,
    sessions: AsyncMutex<BTreeMap<String, SessionEntry>>,
    next_id: std::sync::atomic::AtomicU64,
    engagement_id: String,
    evidence_counter: std::sync::atomic::AtomicU64,
}

/// A screenshot or other evidence artifact's storage key (§4.2's
/// `screenshot` contract).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceKey {
    /// The owning engagement.
    pub engagement_id: String,
    /// The session the artifact came from.
    pub session_id: String,
    /// Monotonically increasing per-engagement counter, for ordering.
    pub counter: u64,
}

impl BrowserSessionCore {
    /// Build a core bounded by `max_sessions`, gating every operation
    /// through `scope_guard`.
    #[must_use]
    pub fn new(scope_guard: Arc<ScopeGuard>, max_sessions: usize, idle_timeout: Duration, engagement_id: impl Into<String>) -> Self {
        Self {
            scope_guard,
            pool: SessionPool::new(max_sessions, idle_timeout),
            sessions: AsyncMutex::new(BTreeMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(0),
            engagement_id: engagement_id.into(),
            evidence_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn fresh_session_id(&self) -> String {
        let n = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("sess-{n}")
    }

    /// Wrap `fut` in a deadline derived from the active contract's
    /// `constraints.timeouts.totalMs`, racing it against the engagement's
    /// shared cancellation token. Every network-suspending operation
    /// (navigate, act, extract, an XSS probe) goes through this.
    async fn with_deadline<T>(&self, operation: &str, fut: impl std::future::Future<Output = T>) -> Result<T, SessionError> {
        let total_ms = self.scope_guard.timeouts().total_ms;
        let cancel = self.scope_guard.cancel_token();
        tokio::select! {
            result = tokio::time::timeout(Duration::from_millis(total_ms), fut) => {
                result.map_err(|_| {
                    SessionError::Timeout(
                        pentest_error::PentestError::new(pentest_error::ErrorCode::Timeout, format!("{operation} exceeded totalMs deadline"))
                            .with_context("ms", total_ms),
                    )
                })
            }
            () = cancel.cancelled() => {
                let reason = self.scope_guard.cancellation_reason();
                tracing::info!(
                    correlation_id = %self.engagement_id,
                    target = operation,
                    decision = "cancelled",
                    "suspension point aborted by cancellation token"
                );
                Err(SessionError::Cancelled(
                    pentest_error::PentestError::new(pentest_error::ErrorCode::Cancelled, format!("{operation} cancelled"))
                        .with_context("reason", reason),
                ))
            }
        }
    }

    /// Allocate a new session routed through `options.proxy_url`. Evicts the
    /// longest-idle READY session if the pool is full; fails with
    /// [`SessionError::SessionLimit`] if none is idle.
    pub async fn create_session<D: BrowserDriver + 'static>(&self, options: SessionOptions) -> Result<String, SessionError> {
        let id = self.fresh_session_id();
        let reserved = self.pool.try_reserve(&id);
        tracing::info!(
            correlation_id = %self.engagement_id,
            target = %id,
            decision = if reserved.is_ok() { "reserved" } else { "rejected" },
            "create_session decided"
        );
        reserved?;

        let driver = D::open(&options).await?;
        self.pool.with_session(&id, |s| s.transition(SessionState::Ready, None));

        self.sessions.lock().await.insert(id.clone(), SessionEntry { driver: Arc::new(driver) });
        Ok(id)
    }

    /// Validate and consume budget for `url`, drive the session to
    /// navigate, and re-validate every redirect hop. A hop outside scope is
    /// a [`SessionError::ScopeViolation`], not a silently followed redirect.
    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<NavigateOutcome, SessionError> {
        let scope_check = self.scope_guard.assert_in_scope(url);
        tracing::info!(
            correlation_id = %self.engagement_id,
            target = url,
            decision = if scope_check.is_ok() { "allow" } else { "deny" },
            "navigate scope check decided"
        );
        scope_check?;
        let host = host_of(url);
        self.scope_guard.consume(&host, 1)?;

        self.pool
            .with_session(session_id, |s| s.transition(SessionState::Navigating, None))
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?
            .map_err(|e| SessionError::Driver(anyhow::anyhow!(e)))?;

        let sessions = self.sessions.lock().await;
        let entry = sessions.get(session_id).ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;

        let outcome = self
            .with_deadline("navigate", entry.driver.navigate(url))
            .await
            .and_then(|r| r.map_err(SessionError::Driver));

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                self.pool.with_session(session_id, |s| s.transition(SessionState::Failed, Some(e.to_string())));
                return Err(e);
            }
        };

        for hop in &outcome.redirect_chain {
            if let Err(violation) = self.scope_guard.assert_in_scope(hop) {
                self.pool.with_session(session_id, |s| {
                    s.transition(SessionState::Ready, Some(format!("ScopeViolation on redirect to {hop}"))).ok()
                });
                return Err(SessionError::ScopeViolation {
                    target: url.to_string(),
                    redirect_target: hop.clone(),
                    reason: violation.reason,
                });
            }
        }

        self.pool.with_session(session_id, |s| s.transition(SessionState::Ready, None));
        Ok(outcome)
    }

    /// Invoke the page oracle to ground `instruction` into a DOM action and
    /// execute it.
    pub async fn act(
        &self,
        session_id: &str,
        instruction: &str,
        oracle: &dyn PageOracle,
    ) -> Result<ActOutcome, SessionError> {
        self.pool
            .with_session(session_id, |s| s.transition(SessionState::Acting, None))
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?
            .map_err(|e| SessionError::Driver(anyhow::anyhow!(e)))?;

        let result = self
            .with_deadline("act", self.act_inner(session_id, instruction, oracle))
            .await
            .and_then(|r| r);

        match &result {
            Ok(_) => {
                self.pool.with_session(session_id, |s| s.transition(SessionState::Ready, None));
            }
            Err(e) => {
                self.pool.with_session(session_id, |s| s.transition(SessionState::Failed, Some(e.to_string())));
            }
        }

        result
    }

    async fn act_inner(
        &self,
        session_id: &str,
        instruction: &str,
        oracle: &dyn PageOracle,
    ) -> Result<ActOutcome, SessionError> {
        let sessions = self.sessions.lock().await;
        let entry = sessions.get(session_id).ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        let driver = &entry.driver;

        let current_url = driver.current_url().await.map_err(SessionError::Driver)?;
        let scope_check = self.scope_guard.assert_in_scope(&current_url);
        tracing::info!(
            correlation_id = %self.engagement_id,
            target = %current_url,
            decision = if scope_check.is_ok() { "allow" } else { "deny" },
            "act scope check decided"
        );
        scope_check?;
        self.scope_guard.consume(&host_of(&current_url), 1)?;

        let elements = driver.visible_interactive_elements().await.map_err(SessionError::Driver)?;
        let text = driver.page_text().await.map_err(SessionError::Driver)?;

        let request = ActionRequest {
            instruction: instruction.to_string(),
            visible_interactive_elements: elements,
            truncated_text: truncate(&text, MAX_ACTION_CHARS),
        };
        let raw = oracle.analyze_action(request).await.map_err(SessionError::Driver)?;
        let action = parse_action_response(&raw)?;

        match action.action_type {
            crate::oracle::ActionType::Click => {
                driver.click(&action.selector).await.map_err(SessionError::Driver)?;
            }
            crate::oracle::ActionType::Fill => {
                let value = action.value.as_deref().unwrap_or_default();
                driver.fill(&action.selector, value).await.map_err(SessionError::Driver)?;
            }
            crate::oracle::ActionType::Select => {
                let value = action.value.as_deref().unwrap_or_default();
                driver.select(&action.selector, value).await.map_err(SessionError::Driver)?;
            }
        }

        let post_url = driver.current_url().await.map_err(SessionError::Driver)?;
        Ok(ActOutcome { selector_used: action.selector, succeeded: true, post_url })
    }

    /// Invoke the page oracle for a free-form extraction and return its
    /// JSON result (or `{"text": raw}` if it wasn't valid JSON).
    pub async fn extract(
        &self,
        session_id: &str,
        instruction: &str,
        oracle: &dyn PageOracle,
    ) -> Result<serde_json::Value, SessionError> {
        let sessions = self.sessions.lock().await;
        let entry = sessions.get(session_id).ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        let driver = &entry.driver;

        let current_url = driver.current_url().await.map_err(SessionError::Driver)?;
        self.scope_guard.assert_in_scope(&current_url)?;

        let text = driver.page_text().await.map_err(SessionError::Driver)?;
        let request = ExtractionRequest {
            instruction: instruction.to_string(),
            truncated_text: truncate(&text, MAX_EXTRACTION_CHARS),
        };
        let raw = self
            .with_deadline("extract", oracle.analyze_extraction(request))
            .await?
            .map_err(SessionError::Driver)?;
        Ok(parse_extraction_response(&raw))
    }

    /// Run the XSS probe engine against one field of a form.
    pub async fn xss_probe(
        &self,
        session_id: &str,
        form_selector: &str,
        field_name: &str,
        payloads: Option<Vec<Payload>>,
    ) -> Result<ProbeReport, SessionError> {
        let sessions = self.sessions.lock().await;
        let entry = sessions.get(session_id).ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        let driver = &entry.driver;

        let current_url = driver.current_url().await.map_err(SessionError::Driver)?;
        self.scope_guard.assert_in_scope(&current_url)?;
        self.scope_guard.consume(&host_of(&current_url), 1)?;

        self.with_deadline("xss_probe", probe_field(driver.as_ref(), form_selector, field_name, payloads, false))
            .await?
            .map_err(SessionError::Driver)
    }

    /// Capture a screenshot and its evidence storage key.
    pub async fn screenshot(&self, session_id: &str) -> Result<(Vec<u8>, EvidenceKey), SessionError> {
        let sessions = self.sessions.lock().await;
        let entry = sessions.get(session_id).ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        let bytes = entry.driver.screenshot().await.map_err(SessionError::Driver)?;
        let counter = self.evidence_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok((
            bytes,
            EvidenceKey {
                engagement_id: self.engagement_id.clone(),
                session_id: session_id.to_string(),
                counter,
            },
        ))
    }

    /// Tear down a session. Idempotent — closing an unknown or already
    /// closed session id is a no-op success.
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.remove(session_id) {
            let _ = entry.driver.close().await;
        }
        self.pool.with_session(session_id, |s| s.transition(SessionState::Closed, None));
        self.pool.remove(session_id);
        Ok(())
    }
}

fn host_of(target: &str) -> String {
    scope_guard::parse_target(target)
        .map(|t| t.host.to_string())
        .unwrap_or_else(|_| target.to_string())
}
