//! Shared command implementations for the pentest CLI.
//!
//! Library-level so they can be tested without spawning the binary.

use anyhow::{Context, Result};
use scope_guard::{BudgetSnapshot, ScopeGuard};
use std::path::Path;
use std::sync::Arc;
use validator_core::{ConfidenceScore, Finding, ValidatorCore};

/// Load a contract file and report every violation found, without building
/// a running [`ScopeGuard`].
///
/// Returns `Ok(())` when the contract is valid; an error listing every
/// violation otherwise.
pub fn validate_contract_file(path: &Path) -> Result<()> {
    scope_guard::load_contract(path)
        .map(|_| ())
        .with_context(|| format!("contract '{}' failed validation", path.display()))
}

/// Load a contract and return a fresh [`BudgetSnapshot`] for it (all
/// dimensions at zero usage, since no guard has consumed anything yet).
pub fn budget_snapshot(path: &Path) -> Result<BudgetSnapshot> {
    let guard = ScopeGuard::load_contract(path)
        .with_context(|| format!("load contract '{}'", path.display()))?;
    Ok(guard.status())
}

/// Parse a JSON-encoded [`Finding`] from `path`.
pub fn load_finding(path: &Path) -> Result<Finding> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read finding file '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse finding from '{}'", path.display()))
}

/// Replay a finding through reproduction, negative controls, and
/// cross-identity checks, against a contract loaded from `contract_path`,
/// and return the resulting confidence score.
///
/// This never starts a daemon: it builds a throwaway [`ScopeGuard`] and
/// [`ValidatorCore`] for the duration of the command.
pub async fn replay_finding(
    contract_path: &Path,
    finding: &Finding,
    repro_count: usize,
) -> Result<ConfidenceScore> {
    let guard = Arc::new(
        ScopeGuard::load_contract(contract_path)
            .with_context(|| format!("load contract '{}'", contract_path.display()))?,
    );
    let validator = ValidatorCore::new(guard);

    let repro = validator
        .run_repro(finding, repro_count)
        .await
        .context("reproduce finding")?;

    Ok(validator_core::score(Some(&repro), &[], None))
}
