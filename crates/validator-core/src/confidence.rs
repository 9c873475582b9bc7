//! Confidence scoring (§4.3.4): combine reproduction, negative-control, and
//! cross-identity evidence into a single recommendation.

use crate::cross_identity::CrossIdentityResult;
use crate::negative_control::NegativeControlResult;
use crate::repro::ReproResult;
use serde::{Deserialize, Serialize};

/// What a confidence score recommends doing with a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Promote,
    Investigate,
    Dismiss,
}

/// The final confidence verdict for a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScore {
    pub repro_score: f64,
    pub neg_score: f64,
    pub xid_score: f64,
    pub overall: f64,
    pub recommendation: Recommendation,
    pub factors: Vec<String>,
}

fn repro_score(repro: Option<&ReproResult>, factors: &mut Vec<String>) -> f64 {
    match repro {
        None => {
            factors.push("no reproduction attempts were run".to_string());
            0.0
        }
        Some(r) => {
            let consistency_multiplier = if r.consistent { 1.0 } else { 0.6 };
            factors.push(format!(
                "reproduction succeeded {:.0}% of attempts ({})",
                r.success_rate * 100.0,
                if r.consistent { "consistent" } else { "inconsistent responses" }
            ));
            r.success_rate * consistency_multiplier
        }
    }
}

fn neg_score(negatives: &[NegativeControlResult], factors: &mut Vec<String>) -> f64 {
    if negatives.is_empty() {
        factors.push("no negative controls were run".to_string());
        return 0.5;
    }
    let passed = negatives.iter().all(|n| n.passed);
    factors.push(if passed {
        "all negative controls behaved as expected".to_string()
    } else {
        "at least one negative control failed to be rejected".to_string()
    });
    if passed {
        1.0
    } else {
        0.0
    }
}

fn xid_score(xid: Option<&CrossIdentityResult>, factors: &mut Vec<String>) -> f64 {
    match xid {
        None => {
            factors.push("no cross-identity probes were run".to_string());
            0.5
        }
        Some(x) if x.results.is_empty() => {
            factors.push("no cross-identity probes were run".to_string());
            0.5
        }
        Some(x) => {
            if x.authorization_enforced {
                factors.push("authorization was enforced across all probed identities".to_string());
                0.0
            } else {
                let violations = x.results.iter().filter(|r| r.violation).count();
                let ratio = violations as f64 / x.results.len() as f64;
                factors.push(format!(
                    "{violations} of {} identities violated expected access",
                    x.results.len()
                ));
                (ratio + 0.5).min(1.0)
            }
        }
    }
}

/// Compute the overall confidence score from whichever validation stages ran.
pub fn score(
    repro: Option<&ReproResult>,
    negatives: &[NegativeControlResult],
    xid: Option<&CrossIdentityResult>,
) -> ConfidenceScore {
    let mut factors = Vec::new();
    let repro_score = repro_score(repro, &mut factors);
    let neg_score = neg_score(negatives, &mut factors);
    let xid_score = xid_score(xid, &mut factors);

    let overall = 0.5 * repro_score + 0.2 * neg_score + 0.3 * xid_score;
    let recommendation = if overall >= 0.75 {
        Recommendation::Promote
    } else if overall >= 0.4 {
        Recommendation::Investigate
    } else {
        Recommendation::Dismiss
    };

    ConfidenceScore { repro_score, neg_score, xid_score, overall, recommendation, factors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_identity::{AuthType, IdentityResult};
    use crate::negative_control::ControlType;
    use crate::repro::ReproAttempt;

    fn repro(success_rate: f64, consistent: bool) -> ReproResult {
        ReproResult { attempts: vec![], success_rate, consistent }
    }

    fn neg(passed: bool) -> NegativeControlResult {
        NegativeControlResult {
            control_type: ControlType::Unauthenticated,
            status: Some(if passed { 401 } else { 200 }),
            error: None,
            ms: 1,
            passed,
        }
    }

    fn identity(violation: bool) -> IdentityResult {
        IdentityResult {
            identity_id: "x".to_string(),
            status: Some(200),
            sha256: None,
            has_access: violation,
            expected_access: false,
            ms: 1,
            violation,
        }
    }

    #[test]
    fn strong_evidence_promotes() {
        let r = repro(1.0, true);
        let negs = vec![neg(true)];
        let xid = CrossIdentityResult { results: vec![identity(true)], authorization_enforced: false };
        let result = score(Some(&r), &negs, Some(&xid));
        assert_eq!(result.recommendation, Recommendation::Promote);
        assert!(result.overall >= 0.75);
    }

    #[test]
    fn enforced_authorization_and_failed_repro_dismisses() {
        let r = repro(0.0, false);
        let negs = vec![neg(true)];
        let xid = CrossIdentityResult { results: vec![], authorization_enforced: true };
        let result = score(Some(&r), &negs, Some(&xid));
        assert_eq!(result.recommendation, Recommendation::Dismiss);
    }

    #[test]
    fn missing_stages_use_neutral_defaults() {
        let result = score(None, &[], None);
        assert_eq!(result.repro_score, 0.0);
        assert_eq!(result.neg_score, 0.5);
        assert_eq!(result.xid_score, 0.5);
    }

    #[test]
    fn no_attempted_reproduction_never_dominates_toward_promote() {
        let negs = vec![neg(true)];
        let xid = CrossIdentityResult { results: vec![identity(true)], authorization_enforced: false };
        let result = score(None, &negs, Some(&xid));
        assert!(result.overall < 0.75);
        assert_ne!(result.recommendation, Recommendation::Promote);
    }

    #[test]
    fn auth_type_variants_are_exhaustive_for_serde() {
        let _ = AuthType::Bearer;
        let _ = AuthType::Basic;
        let _ = AuthType::ApiKey;
        let _ = AuthType::Cookie;
    }
}
