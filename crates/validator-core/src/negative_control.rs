//! Negative controls (§4.3.2): re-issue a finding's request with auth
//! weakened or a parameter mutated, and confirm the server actually enforces
//! something rather than the original finding being an artifact of a open
//! endpoint.

use crate::finding::Finding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// What kind of negative control to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    /// Strip all auth headers entirely.
    Unauthenticated,
    /// Swap auth for a syntactically-valid but bogus token.
    InvalidToken,
    /// Replay as a different authenticated identity.
    DifferentUser,
    /// Mutate the request body/params without touching auth.
    ModifiedRequest,
}

/// A single negative-control request to run against `finding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeControl {
    pub control_type: ControlType,
    #[serde(default)]
    pub modified_headers: BTreeMap<String, String>,
    pub modified_body: Option<String>,
    #[serde(default)]
    pub remove_auth: bool,
    pub expected_status: Option<u16>,
}

/// Outcome of one negative-control run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeControlResult {
    pub control_type: ControlType,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub ms: u64,
    /// Whether the response matched the expected "this should be denied" shape.
    pub passed: bool,
}

const AUTH_HEADER_NAMES: [&str; 3] = ["authorization", "x-api-key", "cookie"];

fn build_headers(finding: &Finding, control: &NegativeControl) -> BTreeMap<String, String> {
    let mut headers = finding.headers.clone();
    if control.remove_auth {
        headers.retain(|k, _| !AUTH_HEADER_NAMES.contains(&k.to_lowercase().as_str()));
    }
    for (k, v) in &control.modified_headers {
        headers.insert(k.clone(), v.clone());
    }
    headers
}

fn default_passes(control_type: ControlType, status: u16) -> bool {
    match control_type {
        ControlType::Unauthenticated | ControlType::InvalidToken => status == 401 || status == 403,
        ControlType::DifferentUser => status == 403 || status == 404,
        ControlType::ModifiedRequest => status >= 400,
    }
}

/// Issue one negative-control request and judge whether the server correctly
/// rejected it.
pub async fn run_negative_control(
    client: &reqwest::Client,
    finding: &Finding,
    control: &NegativeControl,
) -> NegativeControlResult {
    let start = Instant::now();
    let headers = build_headers(finding, control);
    let body = control.modified_body.clone().or_else(|| finding.body.clone());

    let mut builder = client.request(finding.method.as_reqwest(), &finding.url);
    for (k, v) in &headers {
        builder = builder.header(k, v);
    }
    if finding.method.carries_body() {
        if let Some(body) = body {
            builder = builder.body(body);
        }
    }

    match builder.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let passed = match control.expected_status {
                Some(expected) => status == expected,
                None => default_passes(control.control_type, status),
            };
            NegativeControlResult {
                control_type: control.control_type,
                status: Some(status),
                error: None,
                ms: start.elapsed().as_millis() as u64,
                passed,
            }
        }
        Err(e) => NegativeControlResult {
            control_type: control.control_type,
            status: None,
            error: Some(e.to_string()),
            ms: start.elapsed().as_millis() as u64,
            passed: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding_with_headers() -> Finding {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        Finding {
            id: "f1".to_string(),
            url: "https://example.com/api/account".to_string(),
            method: crate::finding::HttpMethod::Get,
            headers,
            body: None,
            expected: None,
        }
    }

    #[test]
    fn remove_auth_strips_authorization_header() {
        let finding = finding_with_headers();
        let control = NegativeControl {
            control_type: ControlType::Unauthenticated,
            modified_headers: BTreeMap::new(),
            modified_body: None,
            remove_auth: true,
            expected_status: None,
        };
        let headers = build_headers(&finding, &control);
        assert!(!headers.contains_key("Authorization"));
        assert!(headers.contains_key("Accept"));
    }

    #[test]
    fn modified_headers_overlay_after_removal() {
        let finding = finding_with_headers();
        let mut modified = BTreeMap::new();
        modified.insert("Authorization".to_string(), "Bearer bogus".to_string());
        let control = NegativeControl {
            control_type: ControlType::InvalidToken,
            modified_headers: modified,
            modified_body: None,
            remove_auth: false,
            expected_status: None,
        };
        let headers = build_headers(&finding, &control);
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer bogus");
    }

    #[test]
    fn default_pass_rules_match_control_type() {
        assert!(default_passes(ControlType::Unauthenticated, 401));
        assert!(default_passes(ControlType::Unauthenticated, 403));
        assert!(!default_passes(ControlType::Unauthenticated, 200));
        assert!(default_passes(ControlType::DifferentUser, 404));
        assert!(default_passes(ControlType::ModifiedRequest, 422));
        assert!(!default_passes(ControlType::ModifiedRequest, 399));
    }
}
