//! The `ScopeGuard` facade (§4.1's public contract).

use crate::approval::{request_approval, ApprovalOutcome, ApprovalRequest};
use crate::audit::AuditLog;
use crate::budget::{BudgetExceeded, BudgetSnapshot, BudgetLedger};
use crate::contract::{load_contract, EngagementContract, ScopeValidationError};
use crate::matching::{evaluate, parse_target, Decision};
use pentest_error::{CancellableRun, CancellationReason, CancellationToken};
use serde_json::json;
use std::path::Path;
use std::sync::RwLock;
use tokio::sync::mpsc::Sender;

/// Result of [`ScopeGuard::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateResult {
    /// Whether the target is in scope.
    pub valid: bool,
    /// Human-readable reason when `valid == false`.
    pub reason: Option<String>,
    /// The allow/deny rule that decided this target, for audit logs.
    pub matched_rule: Option<String>,
}

/// Raised by [`ScopeGuard::assert_in_scope`] when a target fails validation.
/// All side-effecting components must call `assert_in_scope` before acting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{target}' is out of scope: {reason}")]
pub struct OutOfScope {
    /// The raw target string that was rejected.
    pub target: String,
    /// Why it was rejected.
    pub reason: String,
}

/// The trust-kernel component every other subsystem must consult before
/// touching the network. Holds the active [`EngagementContract`], the
/// budget ledger, and the audit trail for one engagement.
pub struct ScopeGuard {
    contract: RwLock<EngagementContract>,
    ledger: RwLock<BudgetLedger>,
    audit: AuditLog,
    cancel: CancellableRun,
}

impl ScopeGuard {
    /// Load a contract from `source` and build a guard around it.
    pub fn load_contract(source: &Path) -> Result<Self, ScopeValidationError> {
        let contract = load_contract(source)?;
        let ledger = BudgetLedger::from_constraints(&contract.constraints);
        let audit = AuditLog::new(contract.identity.id.clone());
        Ok(Self {
            contract: RwLock::new(contract),
            ledger: RwLock::new(ledger),
            audit,
            cancel: CancellableRun::new(),
        })
    }

    /// Atomically replace the active contract with a freshly loaded one.
    /// The budget ledger is reset against the new constraints; prior usage
    /// is not carried forward.
    pub fn reload_contract(&self, source: &Path) -> Result<(), ScopeValidationError> {
        let contract = load_contract(source)?;
        let ledger = BudgetLedger::from_constraints(&contract.constraints);
        *self.ledger.write().expect("ledger lock poisoned") = ledger;
        *self.contract.write().expect("contract lock poisoned") = contract;
        Ok(())
    }

    /// Parse and evaluate `target` against the active contract. Read-only;
    /// does not touch the budget ledger.
    pub fn validate(&self, target: &str) -> ValidateResult {
        let contract = self.contract.read().expect("contract lock poisoned");

        let parsed = match parse_target(target) {
            Ok(t) => t,
            Err(e) => {
                self.audit.append(
                    "SCOPE_DENIED",
                    json!({"target": target, "reason": e.to_string()}),
                );
                return ValidateResult {
                    valid: false,
                    reason: Some(e.to_string()),
                    matched_rule: None,
                };
            }
        };

        let decision = evaluate(&contract, &parsed);
        let result = match &decision {
            Decision::Allow { matched_rule } => ValidateResult {
                valid: true,
                reason: None,
                matched_rule: Some(matched_rule.clone()),
            },
            Decision::Deny { matched_rule } => ValidateResult {
                valid: false,
                reason: Some(matched_rule.clone()),
                matched_rule: Some(matched_rule.clone()),
            },
        };

        self.audit.append(
            if result.valid { "SCOPE_ALLOWED" } else { "SCOPE_DENIED" },
            json!({"target": target, "matchedRule": result.matched_rule}),
        );

        tracing::info!(
            correlation_id = %self.audit.engagement_id(),
            target,
            decision = if result.valid { "allow" } else { "deny" },
            matched_rule = result.matched_rule.as_deref().unwrap_or(""),
            "scope validation decided"
        );

        result
    }

    /// `validate` then raise [`OutOfScope`] if the target is invalid. Every
    /// side-effecting operation in Browser Session Core and Validator Core
    /// must call this before acting on a target.
    pub fn assert_in_scope(&self, target: &str) -> Result<(), OutOfScope> {
        let result = self.validate(target);
        if result.valid {
            Ok(())
        } else {
            Err(OutOfScope {
                target: target.to_string(),
                reason: result.reason.unwrap_or_else(|| "denied".to_string()),
            })
        }
    }

    /// Debit `weight` units of budget (default 1) against `host`.
    pub fn consume(&self, host: &str, weight: u64) -> Result<(), BudgetExceeded> {
        let result = self.ledger.read().expect("ledger lock poisoned").consume(host, weight);
        match &result {
            Ok(()) => {
                self.audit.append("BUDGET_CONSUMED", json!({"host": host, "weight": weight}));
            }
            Err(e) => {
                self.audit.append(
                    "BUDGET_EXCEEDED",
                    json!({"host": host, "kind": e.kind.to_string(), "current": e.current, "limit": e.limit}),
                );
            }
        }
        tracing::info!(
            correlation_id = %self.audit.engagement_id(),
            target = host,
            decision = if result.is_ok() { "consumed" } else { "exceeded" },
            "budget consume decided"
        );
        result
    }

    /// Reserve a concurrency slot. Pair with [`exit_in_flight`](Self::exit_in_flight).
    pub fn enter_in_flight(&self) -> Result<(), BudgetExceeded> {
        self.ledger.read().expect("ledger lock poisoned").enter_in_flight()
    }

    /// Release a concurrency slot reserved by [`enter_in_flight`](Self::enter_in_flight).
    pub fn exit_in_flight(&self) {
        self.ledger.read().expect("ledger lock poisoned").exit_in_flight();
    }

    /// Consult `approvalPolicy` for `action_name`. `details` is recorded in
    /// the audit trail alongside the outcome.
    pub async fn approval(
        &self,
        action_name: &str,
        details: serde_json::Value,
        request_tx: Option<&Sender<ApprovalRequest>>,
    ) -> ApprovalOutcome {
        let policy = self.contract.read().expect("contract lock poisoned").approval_policy.clone();
        let outcome = request_approval(&policy, action_name, request_tx, self.cancel.token()).await;
        self.audit.append(
            "APPROVAL_DECIDED",
            json!({"action": action_name, "details": details, "outcome": outcome.to_string()}),
        );
        tracing::info!(
            correlation_id = %self.audit.engagement_id(),
            target = action_name,
            decision = %outcome.to_string(),
            "approval decided"
        );
        outcome
    }

    /// Current budget ledger state, read-only.
    #[must_use]
    pub fn status(&self) -> BudgetSnapshot {
        self.ledger.read().expect("ledger lock poisoned").snapshot()
    }

    /// The active contract's network timeout constraints, for collaborators
    /// (Browser Session Core, Validator Core) that derive a suspension-point
    /// deadline from them.
    #[must_use]
    pub fn timeouts(&self) -> crate::contract::TimeoutConstraints {
        self.contract.read().expect("contract lock poisoned").constraints.timeouts
    }

    /// Snapshot of the audit trail recorded so far.
    #[must_use]
    pub fn audit_events(&self) -> Vec<crate::audit::AuditEvent> {
        self.audit.events()
    }

    /// The shared cancellation token for this engagement. Browser Session
    /// Core and Validator Core race every suspension point against it.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        self.cancel.token()
    }

    /// Cancel every in-flight operation gated on this guard, recording
    /// `reason` if none was already recorded. Idempotent.
    pub fn cancel(&self, reason: CancellationReason) {
        self.audit.append("CANCELLED", json!({"reason": reason}));
        self.cancel.cancel(reason);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The reason the engagement was cancelled, if it has been.
    #[must_use]
    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.cancel.reason()
    }
}
