//! Validator Core: finding reproduction, negative controls, cross-identity
//! checks, and confidence scoring (§4.3).
//!
//! Every request this crate issues is gated on [`scope_guard::ScopeGuard`]:
//! a finding whose URL falls outside the active engagement contract is
//! rejected before any network call is made.

pub mod confidence;
pub mod cross_identity;
pub mod finding;
pub mod negative_control;
pub mod repro;

pub use confidence::{score, ConfidenceScore, Recommendation};
pub use cross_identity::{run_cross_identity, AuthType, CrossIdentityResult, IdentityProbe, IdentityResult};
pub use finding::{Expectation, Finding, HttpMethod};
pub use negative_control::{run_negative_control, ControlType, NegativeControl, NegativeControlResult};
pub use repro::{run_repro, ReproAttempt, ReproResult};

use pentest_error::{ErrorCode, PentestError};
use scope_guard::{OutOfScope, ScopeGuard};
use std::sync::Arc;
use std::time::Duration;

/// Errors raised by [`ValidatorCore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    /// The finding's URL failed Scope Guard validation.
    #[error(transparent)]
    OutOfScope(#[from] OutOfScope),
    /// The budget ledger rejected a `consume` call for this finding's host.
    #[error(transparent)]
    Budget(#[from] scope_guard::BudgetExceeded),
    /// The replay did not complete within `constraints.timeouts.totalMs`.
    #[error(transparent)]
    Timeout(#[from] PentestError),
    /// The replay was aborted by the engagement's shared cancellation token.
    #[error("{0}")]
    Cancelled(PentestError),
}

/// Ties reproduction, negative-control, and cross-identity checks together
/// behind one scope-gated facade.
pub struct ValidatorCore {
    scope_guard: Arc<ScopeGuard>,
    client: reqwest::Client,
    total_timeout: Duration,
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

impl ValidatorCore {
    /// Build a validator bound to `scope_guard`, reusing one `reqwest::Client`
    /// across every replay it issues. The client's connect and per-request
    /// timeouts, and the deadline wrapping each replay loop, are all derived
    /// from the active contract's `constraints.timeouts`.
    #[must_use]
    pub fn new(scope_guard: Arc<ScopeGuard>) -> Self {
        let timeouts = scope_guard.timeouts();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .timeout(Duration::from_millis(timeouts.read_ms))
            .build()
            .unwrap_or_default();
        Self {
            scope_guard,
            client,
            total_timeout: Duration::from_millis(timeouts.total_ms),
        }
    }

    fn gate(&self, finding: &Finding) -> Result<(), ValidatorError> {
        let result = self
            .scope_guard
            .assert_in_scope(&finding.url)
            .map_err(ValidatorError::from)
            .and_then(|()| self.scope_guard.consume(&host_of(&finding.url), 1).map_err(ValidatorError::from));
        tracing::info!(
            correlation_id = %finding.id,
            target = %finding.url,
            decision = if result.is_ok() { "allow" } else { "deny" },
            "validator gate decided"
        );
        result
    }

    async fn with_deadline<T>(&self, operation: &str, fut: impl std::future::Future<Output = T>) -> Result<T, ValidatorError> {
        let cancel = self.scope_guard.cancel_token();
        tokio::select! {
            result = tokio::time::timeout(self.total_timeout, fut) => {
                result.map_err(|_| {
                    ValidatorError::Timeout(
                        PentestError::new(ErrorCode::Timeout, format!("{operation} exceeded totalMs deadline"))
                            .with_correlation_id(operation.to_string()),
                    )
                })
            }
            () = cancel.cancelled() => {
                tracing::info!(
                    correlation_id = operation,
                    decision = "cancelled",
                    "replay aborted by cancellation token"
                );
                Err(ValidatorError::Cancelled(
                    PentestError::new(ErrorCode::Cancelled, format!("{operation} cancelled"))
                        .with_correlation_id(operation.to_string())
                        .with_context("reason", self.scope_guard.cancellation_reason()),
                ))
            }
        }
    }

    /// Replay `finding`'s request `count` times after confirming it is in
    /// scope and has budget remaining.
    pub async fn run_repro(&self, finding: &Finding, count: usize) -> Result<ReproResult, ValidatorError> {
        self.gate(finding)?;
        self.with_deadline("run_repro", repro::run_repro(&self.client, finding, count)).await
    }

    /// Run one negative control against `finding`.
    pub async fn run_negative_control(
        &self,
        finding: &Finding,
        control: &NegativeControl,
    ) -> Result<NegativeControlResult, ValidatorError> {
        self.gate(finding)?;
        self.with_deadline("run_negative_control", negative_control::run_negative_control(&self.client, finding, control))
            .await
    }

    /// Replay `finding`'s request as every identity in `probes`.
    pub async fn run_cross_identity(
        &self,
        finding: &Finding,
        probes: &[IdentityProbe],
    ) -> Result<CrossIdentityResult, ValidatorError> {
        self.gate(finding)?;
        self.with_deadline("run_cross_identity", cross_identity::run_cross_identity(&self.client, finding, probes))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn host_of_extracts_host_from_url() {
        assert_eq!(host_of("https://example.com/path"), "example.com");
        assert_eq!(host_of("not a url"), "not a url");
    }

    fn write_contract(total_ms: u64) -> tempfile::NamedTempFile {
        let body = format!(
            r#"
schemaVersion: "1.0"
identity:
  id: eng-1
  name: Example Engagement
  client: Example Corp
  startDate: "2026-01-01"
  endDate: "2026-02-01"
  timezone: UTC
allowlist:
  domains: []
  ipRanges: ["127.0.0.0/8"]
  ports: []
  services: []
denylist:
  domains: []
  ipRanges: []
  ports: []
  pathKeywords: []
constraints:
  rate: {{ rps: 100.0, maxConcurrent: 10, burst: 100 }}
  budget: {{ maxTotalRequests: 1000, maxPerTarget: 500, maxDurationHours: 8 }}
  timeouts: {{ connectMs: 1000, readMs: 5000, totalMs: {total_ms} }}
approvalPolicy:
  mode: AUTO_APPROVE
  timeoutSec: 30
  defaultAction: DENY
  escalation: {{ onTimeout: use_default, onError: deny, notify: false }}
"#
        );
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn run_repro_raises_timeout_past_total_ms_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let file = write_contract(150);
        let guard = Arc::new(ScopeGuard::load_contract(file.path()).unwrap());
        let validator = ValidatorCore::new(guard);

        let finding = Finding {
            id: "f1".to_string(),
            url: format!("{}/slow", server.uri()),
            method: HttpMethod::Get,
            headers: Default::default(),
            body: None,
            expected: None,
        };
        let err = validator.run_repro(&finding, 1).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Timeout(_)));
    }

    #[tokio::test]
    async fn run_repro_raises_cancelled_when_token_fires_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let file = write_contract(5_000);
        let guard = Arc::new(ScopeGuard::load_contract(file.path()).unwrap());
        let validator = ValidatorCore::new(guard.clone());

        let finding = Finding {
            id: "f1".to_string(),
            url: format!("{}/slow", server.uri()),
            method: HttpMethod::Get,
            headers: Default::default(),
            body: None,
            expected: None,
        };

        guard.cancel(pentest_error::CancellationReason::UserRequested);
        let err = validator.run_repro(&finding, 1).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Cancelled(_)));
    }
}
