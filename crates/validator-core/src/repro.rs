//! Reproduction (§4.3.1): replay a finding's request `count` times and
//! measure how consistently it reproduces.

use crate::finding::Finding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Instant;

/// Outcome of a single reproduction attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproAttempt {
    /// HTTP status received, if the request completed.
    pub status: Option<u16>,
    /// Response body length in bytes.
    pub len: Option<usize>,
    /// SHA-256 of the response body, hex-encoded.
    pub sha256: Option<String>,
    /// Whether this attempt matched `finding.expected` (or the default rule).
    pub matched_expectations: bool,
    /// Wall-clock duration of the attempt, in milliseconds.
    pub ms: u64,
    /// Error message, if the request itself failed (network error, etc).
    pub error: Option<String>,
}

/// Aggregate result of [`run_repro`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproResult {
    /// Every individual attempt, in order.
    pub attempts: Vec<ReproAttempt>,
    /// Fraction of attempts that matched expectations.
    pub success_rate: f64,
    /// `true` iff matched attempts all shared one response body hash and at
    /// least one attempt matched.
    pub consistent: bool,
}

fn matches_expectation(status: u16, body: &str, expected: Option<&crate::finding::Expectation>) -> bool {
    let Some(expected) = expected else {
        return (200..300).contains(&status);
    };

    if let Some(expected_status) = expected.status_code {
        if status != expected_status {
            return false;
        }
    }
    if !expected.body_contains.iter().all(|s| body.contains(s.as_str())) {
        return false;
    }
    if expected.body_not_contains.iter().any(|s| body.contains(s.as_str())) {
        return false;
    }
    if let Some(pattern) = &expected.body_regex {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(body) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
    true
}

/// Replay `finding`'s request `count` times (default 3 at the call site) and
/// compute per-attempt outcomes plus the aggregate success rate and
/// consistency.
pub async fn run_repro(client: &reqwest::Client, finding: &Finding, count: usize) -> ReproResult {
    let mut attempts = Vec::with_capacity(count);

    for _ in 0..count {
        let start = Instant::now();
        let mut builder = client.request(finding.method.as_reqwest(), &finding.url);
        for (k, v) in &finding.headers {
            builder = builder.header(k, v);
        }
        if finding.method.carries_body() {
            if let Some(body) = &finding.body {
                builder = builder.body(body.clone());
            }
        }

        let attempt = match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let mut hasher = Sha256::new();
                hasher.update(body.as_bytes());
                let sha256 = hex::encode(hasher.finalize());
                let matched = matches_expectation(status, &body, finding.expected.as_ref());
                ReproAttempt {
                    status: Some(status),
                    len: Some(body.len()),
                    sha256: Some(sha256),
                    matched_expectations: matched,
                    ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(e) => ReproAttempt {
                status: None,
                len: None,
                sha256: None,
                matched_expectations: false,
                ms: start.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        };
        attempts.push(attempt);
    }

    let successful_matched = attempts.iter().filter(|a| a.matched_expectations).count();
    let success_rate = if count == 0 { 0.0 } else { successful_matched as f64 / count as f64 };

    let unique_hashes: BTreeSet<&String> = attempts
        .iter()
        .filter(|a| a.matched_expectations)
        .filter_map(|a| a.sha256.as_ref())
        .collect();
    let consistent = unique_hashes.len() <= 1 && successful_matched > 0;

    ReproResult { attempts, success_rate, consistent }
}
