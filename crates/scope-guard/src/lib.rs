//! Engagement contract authority: the trust kernel every side-effecting
//! operation in the harness must consult before touching the network.
//!
//! Owns the active `EngagementContract`, the budget ledger, the approval
//! workflow, and the hash-chained audit trail. See [`ScopeGuard`] for the
//! public surface.

pub mod approval;
pub mod audit;
pub mod budget;
pub mod contract;
pub mod guard;
pub mod matching;

pub use approval::{ApprovalDecision, ApprovalOutcome, ApprovalRequest};
pub use audit::{AuditEvent, AuditLog};
pub use budget::{BudgetExceeded, BudgetKind, BudgetLedger, BudgetSnapshot};
pub use contract::{load_contract, EngagementContract, ScopeValidationError, Violation};
pub use guard::{OutOfScope, ScopeGuard, ValidateResult};
pub use matching::{domain_matches, evaluate, parse_target, Decision, Host, InvalidTarget, Target};
