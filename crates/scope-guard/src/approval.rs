//! Approval workflow (§4.1.3).

use crate::contract::{ApprovalMode, ApprovalPolicyConfig, DefaultAction, Escalation};
use pentest_error::CancellationToken;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Outcome of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// The action may proceed.
    Approved,
    /// The action is denied.
    Denied,
}

/// Why a decision was reached, for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// `mode: AUTO_APPROVE` granted the request without a human in the loop.
    AutoApproved,
    /// `mode: DENY_ALL` rejected the request without a human in the loop.
    AutoDenied,
    /// A human responded before the timeout elapsed.
    Decided(ApprovalDecision),
    /// No human response arrived before `timeoutSec`; `escalation.onTimeout`
    /// determined the outcome.
    TimedOut(ApprovalDecision),
    /// The approval channel was dropped/errored; `escalation.onError`
    /// determined the outcome.
    Errored(ApprovalDecision),
    /// The engagement's cancellation token fired before a decision arrived.
    /// Always resolves to `Denied`: a cancelled run never proceeds.
    Cancelled,
}

impl ApprovalOutcome {
    /// The final decision, regardless of how it was reached.
    #[must_use]
    pub fn decision(&self) -> ApprovalDecision {
        match self {
            Self::AutoApproved => ApprovalDecision::Approved,
            Self::AutoDenied | Self::Cancelled => ApprovalDecision::Denied,
            Self::Decided(d) | Self::TimedOut(d) | Self::Errored(d) => *d,
        }
    }
}

impl fmt::Display for ApprovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto-approved"),
            Self::AutoDenied => write!(f, "auto-denied"),
            Self::Decided(d) => write!(f, "decided by operator: {d:?}"),
            Self::TimedOut(d) => write!(f, "timed out, escalated to {d:?}"),
            Self::Errored(d) => write!(f, "approval channel errored, escalated to {d:?}"),
            Self::Cancelled => write!(f, "cancelled before a decision was reached"),
        }
    }
}

/// A pending request for human approval, handed to whatever surface presents
/// it to an operator (CLI prompt, daemon transport, etc.).
#[derive(Debug)]
pub struct ApprovalRequest {
    /// The action name or description being gated.
    pub action: String,
    /// Channel the operator's decision is sent on.
    pub responder: oneshot::Sender<ApprovalDecision>,
}

fn escalate(escalation: Escalation, default_action: DefaultAction) -> ApprovalDecision {
    match escalation {
        Escalation::Deny => ApprovalDecision::Denied,
        Escalation::Allow => ApprovalDecision::Approved,
        Escalation::UseDefault => match default_action {
            DefaultAction::Deny => ApprovalDecision::Denied,
            DefaultAction::Allow => ApprovalDecision::Approved,
        },
    }
}

/// Evaluate an approval request against the contract's policy.
///
/// Under `INTERACTIVE` mode, `request_tx` (if provided) receives an
/// [`ApprovalRequest`] and this function waits up to `timeoutSec` for a
/// response on its oneshot channel. If no channel is supplied, or the wait
/// times out or the channel is dropped, the configured escalation applies.
/// `cancel` is raced against that wait: if it fires first, the request
/// resolves to [`ApprovalOutcome::Cancelled`] regardless of `timeoutSec`.
pub async fn request_approval(
    policy: &ApprovalPolicyConfig,
    action: &str,
    request_tx: Option<&tokio::sync::mpsc::Sender<ApprovalRequest>>,
    cancel: &CancellationToken,
) -> ApprovalOutcome {
    match policy.mode {
        ApprovalMode::AutoApprove => ApprovalOutcome::AutoApproved,
        ApprovalMode::DenyAll => ApprovalOutcome::AutoDenied,
        ApprovalMode::Interactive => {
            let Some(tx) = request_tx else {
                return ApprovalOutcome::Errored(escalate(
                    policy.escalation.on_error,
                    policy.default_action,
                ));
            };

            let (resp_tx, resp_rx) = oneshot::channel();
            let request = ApprovalRequest {
                action: action.to_string(),
                responder: resp_tx,
            };

            if tx.send(request).await.is_err() {
                return ApprovalOutcome::Errored(escalate(
                    policy.escalation.on_error,
                    policy.default_action,
                ));
            }

            tokio::select! {
                result = timeout(Duration::from_secs(policy.timeout_sec), resp_rx) => match result {
                    Ok(Ok(decision)) => ApprovalOutcome::Decided(decision),
                    Ok(Err(_)) => ApprovalOutcome::Errored(escalate(
                        policy.escalation.on_error,
                        policy.default_action,
                    )),
                    Err(_) => ApprovalOutcome::TimedOut(escalate(
                        policy.escalation.on_timeout,
                        policy.default_action,
                    )),
                },
                () = cancel.cancelled() => ApprovalOutcome::Cancelled,
            }
        }
    }
}
