//! Confirms `ValidatorCore` refuses to replay a finding outside the active
//! engagement contract before any network call is made.

use scope_guard::ScopeGuard;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use validator_core::{Finding, HttpMethod, ValidatorCore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_contract() -> tempfile::NamedTempFile {
    let body = r#"
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
  rate: { rps: 100.0, maxConcurrent: 10, burst: 100 }
  budget: { maxTotalRequests: 1000, maxPerTarget: 500, maxDurationHours: 8 }
  timeouts: { connectMs: 1000, readMs: 5000, totalMs: 10000 }
approvalPolicy:
  mode: AUTO_APPROVE
  timeoutSec: 30
  defaultAction: DENY
  escalation: { onTimeout: use_default, onError: deny, notify: false }
"#;
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn finding_for(url: String) -> Finding {
    Finding { id: "f1".to_string(), url, method: HttpMethod::Get, headers: BTreeMap::new(), body: None, expected: None }
}

#[tokio::test]
async fn in_scope_replay_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/ping")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let file = write_contract();
    let guard = Arc::new(ScopeGuard::load_contract(file.path()).unwrap());
    let validator = ValidatorCore::new(guard);

    let finding = finding_for(format!("{}/ping", server.uri()));
    let result = validator.run_repro(&finding, 1).await.unwrap();
    assert_eq!(result.attempts[0].status, Some(200));
}

#[tokio::test]
async fn out_of_scope_replay_is_rejected_before_any_request() {
    let file = write_contract();
    let guard = Arc::new(ScopeGuard::load_contract(file.path()).unwrap());
    let validator = ValidatorCore::new(guard);

    let finding = finding_for("https://not-in-scope.example.net/secret".to_string());
    let err = validator.run_repro(&finding, 1).await;
    assert!(err.is_err());
}
