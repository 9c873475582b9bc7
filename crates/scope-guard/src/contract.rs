//! Engagement contract data model and loading (§3, §4.1 `loadContract`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

fn schema_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("static regex compiles"))
}

/// A single `(path, message)` schema or semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path to the offending field, e.g. `"constraints.rate.rps"`.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Raised by [`load_contract`] when the contract fails schema or semantic
/// validation. Carries *every* violation found, never just the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeValidationError {
    /// All violations found, in detection order.
    pub violations: Vec<Violation>,
}

impl fmt::Display for ScopeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract failed validation with {} issue(s):", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {}: {}", v.path, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScopeValidationError {}

/// Root entity: the machine-readable authorization document for an engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngagementContract {
    /// Must match `^\d+\.\d+$`.
    pub schema_version: String,
    /// Engagement identity metadata.
    pub identity: Identity,
    /// Hosts/ranges/ports/services explicitly in scope.
    pub allowlist: Allowlist,
    /// Hosts/ranges/ports/keywords always out of scope, checked first.
    #[serde(default)]
    pub denylist: Option<Denylist>,
    /// Rate, budget, and timeout constraints.
    pub constraints: Constraints,
    /// Approval workflow configuration.
    pub approval_policy: ApprovalPolicyConfig,
    /// Per-action overrides.
    #[serde(default)]
    pub actions: Option<ActionPolicy>,
    /// Credential bindings available to the engagement.
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// Engagement identity metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Identity {
    /// Unique engagement id.
    pub id: String,
    /// Human-readable engagement name.
    pub name: String,
    /// Client name.
    pub client: String,
    /// ISO-8601 start date.
    pub start_date: String,
    /// ISO-8601 end date.
    pub end_date: String,
    /// IANA timezone name.
    pub timezone: String,
}

/// Hosts/ranges/ports/services in scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Allowlist {
    /// Domain patterns, exact or `*.suffix` wildcard.
    #[serde(default)]
    pub domains: Vec<String>,
    /// CIDR ranges.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    /// Explicit ports. Empty means "no port restriction".
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Named services, informational only (not matched against targets).
    #[serde(default)]
    pub services: Vec<String>,
}

/// Hosts/ranges/ports/keywords always rejected, checked before the allowlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Denylist {
    /// Domain patterns, exact or `*.suffix` wildcard.
    #[serde(default)]
    pub domains: Vec<String>,
    /// CIDR ranges.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    /// Explicit ports.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Substrings checked against the lowercased request path.
    #[serde(default)]
    pub path_keywords: Vec<String>,
}

/// Rate, budget, and timeout constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Constraints {
    /// Request-rate limiter parameters.
    pub rate: RateConstraints,
    /// Absolute request budgets.
    pub budget: BudgetConstraints,
    /// Network operation timeouts.
    pub timeouts: TimeoutConstraints,
}

/// Token-bucket rate parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateConstraints {
    /// Sustained requests per second. Must be `>= 0.1`.
    pub rps: f64,
    /// Maximum in-flight requests. Must be `>= 1`.
    pub max_concurrent: u32,
    /// Token-bucket burst capacity. Must be `>= 1`.
    pub burst: u32,
}

/// Absolute request budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BudgetConstraints {
    /// Total requests across the whole engagement.
    pub max_total_requests: u64,
    /// Maximum requests against any single host.
    pub max_per_target: u64,
    /// Maximum engagement duration in hours.
    pub max_duration_hours: f64,
}

/// Network operation timeouts, each `>= 100` ms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeoutConstraints {
    /// TCP connect timeout.
    pub connect_ms: u64,
    /// Read timeout.
    pub read_ms: u64,
    /// Total operation timeout.
    pub total_ms: u64,
}

/// Approval policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalMode {
    /// Every gated action waits for a human decision.
    Interactive,
    /// Every gated action is approved automatically.
    AutoApprove,
    /// Every gated action is denied automatically.
    DenyAll,
}

/// Default decision applied when an approval wait times out or errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultAction {
    /// Deny on ambiguity.
    Deny,
    /// Allow on ambiguity.
    Allow,
}

/// What to do when an approval wait times out or the channel errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Apply `defaultAction`.
    UseDefault,
    /// Always deny regardless of `defaultAction`.
    Deny,
    /// Always allow regardless of `defaultAction`.
    Allow,
}

/// Escalation behavior for timeout/error conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EscalationPolicy {
    /// Behavior when the approval wait exceeds `timeoutSec`.
    pub on_timeout: Escalation,
    /// Behavior when the approval channel itself errors.
    pub on_error: Escalation,
    /// Whether to notify an operator out-of-band (advisory only).
    #[serde(default)]
    pub notify: bool,
}

/// Approval workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalPolicyConfig {
    /// Overall mode.
    pub mode: ApprovalMode,
    /// Seconds to wait for an interactive decision.
    pub timeout_sec: u64,
    /// Fallback decision on ambiguity.
    pub default_action: DefaultAction,
    /// Timeout/error escalation behavior.
    pub escalation: EscalationPolicy,
}

/// Per-action overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionPolicy {
    /// Action names that are never permitted, regardless of approval mode.
    #[serde(default)]
    pub forbidden: Vec<String>,
    /// Action names that always require approval even under `AUTO_APPROVE`.
    #[serde(default)]
    pub requires_approval: Vec<String>,
}

/// Credential type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// HTTP Basic auth.
    Basic,
    /// Bearer token.
    Bearer,
    /// API key header.
    ApiKey,
    /// OAuth2 token.
    Oauth2,
    /// Anything else, interpreted by the identity store.
    Custom,
}

/// A credential binding available to the engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Credential {
    /// Identifier used to reference this credential elsewhere (e.g. findings).
    pub id: String,
    /// Credential type.
    #[serde(rename = "type")]
    pub kind: CredentialType,
    /// Environment variable names this credential's secret material is bound to.
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    /// Hosts/domains this credential may be used against.
    #[serde(default)]
    pub scope: Vec<String>,
}

/// Detect YAML vs JSON by extension, falling back to a content sniff.
fn looks_like_json(content: &str) -> bool {
    content.trim_start().starts_with('{')
}

/// Parse raw contract text. Tries the format implied by `path`'s extension
/// first, then falls back to sniffing the content.
fn parse_raw(content: &str, path: &Path) -> Result<EngagementContract, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let try_yaml = || serde_yaml::from_str::<EngagementContract>(content).map_err(|e| e.to_string());
    let try_json = || serde_json::from_str::<EngagementContract>(content).map_err(|e| e.to_string());

    match ext.as_str() {
        "yaml" | "yml" => try_yaml(),
        "json" => try_json(),
        _ if looks_like_json(content) => try_json().or_else(|_| try_yaml()),
        _ => try_yaml().or_else(|_| try_json()),
    }
}

/// Load and validate an [`EngagementContract`] from a file path.
///
/// Accepts YAML or JSON, detected by extension and falling back to a content
/// sniff. On any schema or semantic violation, returns every violation found
/// rather than stopping at the first. Domains and path keywords are
/// lowercased on success; IP ranges are left verbatim.
pub fn load_contract(path: &Path) -> Result<EngagementContract, ScopeValidationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ScopeValidationError {
        violations: vec![Violation::new("<file>", format!("failed to read {}: {e}", path.display()))],
    })?;
    parse_contract(&content, path)
}

/// Parse and validate contract text already read into memory (used by
/// `load_contract` and directly by tests / the CLI linter).
pub fn parse_contract(content: &str, path: &Path) -> Result<EngagementContract, ScopeValidationError> {
    let mut contract = parse_raw(content, path).map_err(|e| ScopeValidationError {
        violations: vec![Violation::new("<root>", e)],
    })?;

    let violations = validate_semantics(&contract);
    if !violations.is_empty() {
        return Err(ScopeValidationError { violations });
    }

    normalize(&mut contract);
    Ok(contract)
}

/// Lowercase domain and keyword entries in place. IP ranges are left verbatim.
fn normalize(contract: &mut EngagementContract) {
    for d in &mut contract.allowlist.domains {
        *d = d.to_ascii_lowercase();
    }
    if let Some(deny) = &mut contract.denylist {
        for d in &mut deny.domains {
            *d = d.to_ascii_lowercase();
        }
        for k in &mut deny.path_keywords {
            *k = k.to_ascii_lowercase();
        }
    }
}

/// Accumulate every semantic violation without short-circuiting.
fn validate_semantics(c: &EngagementContract) -> Vec<Violation> {
    let mut errs = Vec::new();

    if !schema_version_re().is_match(&c.schema_version) {
        errs.push(Violation::new(
            "schemaVersion",
            format!("'{}' does not match ^\\d+\\.\\d+$", c.schema_version),
        ));
    }

    for (field, value) in [
        ("identity.startDate", &c.identity.start_date),
        ("identity.endDate", &c.identity.end_date),
    ] {
        if chrono::DateTime::parse_from_rfc3339(value).is_err()
            && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err()
        {
            errs.push(Violation::new(field, format!("'{value}' is not a valid ISO-8601 date")));
        }
    }

    if c.constraints.rate.rps < 0.1 {
        errs.push(Violation::new(
            "constraints.rate.rps",
            format!("{} is below the minimum of 0.1", c.constraints.rate.rps),
        ));
    }
    if c.constraints.rate.max_concurrent < 1 {
        errs.push(Violation::new(
            "constraints.rate.maxConcurrent",
            "must be >= 1",
        ));
    }
    if c.constraints.rate.burst < 1 {
        errs.push(Violation::new("constraints.rate.burst", "must be >= 1"));
    }

    for (field, ms) in [
        ("constraints.timeouts.connectMs", c.constraints.timeouts.connect_ms),
        ("constraints.timeouts.readMs", c.constraints.timeouts.read_ms),
        ("constraints.timeouts.totalMs", c.constraints.timeouts.total_ms),
    ] {
        if ms < 100 {
            errs.push(Violation::new(field, format!("{ms} is below the minimum of 100")));
        }
    }

    if c.constraints.budget.max_total_requests == 0 {
        errs.push(Violation::new(
            "constraints.budget.maxTotalRequests",
            "must be > 0",
        ));
    }
    if c.constraints.budget.max_per_target == 0 {
        errs.push(Violation::new(
            "constraints.budget.maxPerTarget",
            "must be > 0",
        ));
    }

    if c.approval_policy.timeout_sec == 0 && c.approval_policy.mode == ApprovalMode::Interactive {
        errs.push(Violation::new(
            "approvalPolicy.timeoutSec",
            "must be > 0 when mode is INTERACTIVE",
        ));
    }

    for (idx, cred) in c.credentials.iter().enumerate() {
        if cred.id.is_empty() {
            errs.push(Violation::new(format!("credentials[{idx}].id"), "must not be empty"));
        }
    }

    errs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_contract_yaml() -> &'static str {
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
  domains: ["*.Example.COM"]
  ipRanges: []
  ports: [443]
  services: []
constraints:
  rate: { rps: 1.0, maxConcurrent: 4, burst: 5 }
  budget: { maxTotalRequests: 1000, maxPerTarget: 100, maxDurationHours: 8 }
  timeouts: { connectMs: 1000, readMs: 5000, totalMs: 10000 }
approvalPolicy:
  mode: AUTO_APPROVE
  timeoutSec: 30
  defaultAction: DENY
  escalation: { onTimeout: use_default, onError: deny, notify: false }
"#
    }

    #[test]
    fn loads_and_normalizes_minimal_contract() {
        let contract =
            parse_contract(minimal_contract_yaml(), Path::new("contract.yaml")).expect("valid");
        assert_eq!(contract.allowlist.domains, vec!["*.example.com"]);
        assert_eq!(contract.schema_version, "1.0");
    }

    #[test]
    fn rejects_bad_schema_version() {
        let bad = minimal_contract_yaml().replace("\"1.0\"", "\"1\"");
        let err = parse_contract(&bad, Path::new("c.yaml")).unwrap_err();
        assert!(err.violations.iter().any(|v| v.path == "schemaVersion"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let bad = minimal_contract_yaml().replace(
            "timezone: UTC",
            "timezone: UTC\n  bogusField: true",
        );
        let result = parse_contract(&bad, Path::new("c.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn accumulates_multiple_violations() {
        let bad = minimal_contract_yaml()
            .replace("rps: 1.0", "rps: 0.01")
            .replace("connectMs: 1000", "connectMs: 10");
        let err = parse_contract(&bad, Path::new("c.yaml")).unwrap_err();
        assert!(err.violations.len() >= 2, "expected >=2 violations, got {:?}", err.violations);
    }

    #[test]
    fn json_content_is_sniffed_without_extension() {
        let json = r#"{
            "schemaVersion": "1.0",
            "identity": {"id":"e","name":"n","client":"c","startDate":"2026-01-01","endDate":"2026-02-01","timezone":"UTC"},
            "allowlist": {"domains":["EXAMPLE.COM"],"ipRanges":[],"ports":[],"services":[]},
            "constraints": {
                "rate": {"rps":1.0,"maxConcurrent":1,"burst":1},
                "budget": {"maxTotalRequests":10,"maxPerTarget":10,"maxDurationHours":1},
                "timeouts": {"connectMs":100,"readMs":100,"totalMs":100}
            },
            "approvalPolicy": {"mode":"DENY_ALL","timeoutSec":1,"defaultAction":"DENY","escalation":{"onTimeout":"deny","onError":"deny","notify":false}}
        }"#;
        let contract = parse_contract(json, Path::new("noext")).expect("valid json");
        assert_eq!(contract.allowlist.domains, vec!["example.com"]);
    }
}
