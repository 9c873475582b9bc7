//! Unified error taxonomy and cancellation primitives for the pentest harness.
//!
//! Every error raised by Scope Guard, Browser Session Core, or Validator Core
//! carries an [`ErrorCode`] — a stable, machine-readable tag suitable for the
//! JSON wire format in the external interfaces — plus a human-readable
//! message and arbitrary structured context. The taxonomy is a sum type
//! keyed by `code`; callers match on `code`, never on a class hierarchy.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod cancel;

pub use cancel::{CancellableRun, CancellationReason, CancellationToken};

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to, matching §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Contract load/validation failures — fatal at startup under `FAIL_CLOSED`.
    Configuration,
    /// Out-of-scope, budget exhausted, approval denied — never retried.
    Policy,
    /// Driver init, proxy unreachable — terminal for the affected session only.
    Session,
    /// Timeouts, connection resets — caller decides whether to retry.
    TransientIo,
    /// Malformed oracle JSON or schema violation.
    Oracle,
    /// Repro/control/cross-identity results are data, never propagated as
    /// errors; this category exists only so `ErrorCode::category` is total.
    Validation,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Policy => "policy",
            Self::Session => "session",
            Self::TransientIo => "transient_io",
            Self::Oracle => "oracle",
            Self::Validation => "validation",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code. Serialises as `SCREAMING_SNAKE_CASE`,
/// matching the minimum code set required by §6's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Engagement contract failed schema or semantic validation.
    ScopeValidationFailed,
    /// A target was rejected by Scope Guard's deny/allow decision.
    OutOfScope,
    /// A budget ledger cap (total, per-target, rate, concurrency) was breached.
    BudgetExceeded,
    /// An approval request was denied or timed out into denial.
    ApprovalDenied,
    /// The referenced session id does not exist.
    SessionNotFound,
    /// An operation required an active session but none was supplied.
    NoActiveSession,
    /// The session pool is full and no idle session could be evicted.
    SessionLimitExceeded,
    /// Browser navigation failed.
    NavigationFailed,
    /// A natural-language action could not be executed against the DOM.
    ActionFailed,
    /// Structured extraction failed.
    ExtractionFailed,
    /// The XSS probe engine failed to complete.
    XssTestFailed,
    /// A named form field could not be located.
    FieldNotFound,
    /// An operation exceeded its deadline.
    Timeout,
    /// The interception proxy could not be reached.
    ProxyConnectionFailed,
    /// A top-level operation was aborted by an external cancellation signal.
    Cancelled,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ScopeValidationFailed => ErrorCategory::Configuration,
            Self::OutOfScope | Self::BudgetExceeded | Self::ApprovalDenied => {
                ErrorCategory::Policy
            }
            Self::SessionNotFound
            | Self::NoActiveSession
            | Self::SessionLimitExceeded
            | Self::NavigationFailed
            | Self::ActionFailed
            | Self::ProxyConnectionFailed
            | Self::Cancelled => ErrorCategory::Session,
            Self::ExtractionFailed | Self::XssTestFailed | Self::FieldNotFound => {
                ErrorCategory::Session
            }
            Self::Timeout => ErrorCategory::TransientIo,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation (e.g. `"OUT_OF_SCOPE"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScopeValidationFailed => "SCOPE_VALIDATION_FAILED",
            Self::OutOfScope => "OUT_OF_SCOPE",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::ApprovalDenied => "APPROVAL_DENIED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::SessionLimitExceeded => "SESSION_LIMIT_EXCEEDED",
            Self::NavigationFailed => "NAVIGATION_FAILED",
            Self::ActionFailed => "ACTION_FAILED",
            Self::ExtractionFailed => "EXTRACTION_FAILED",
            Self::XssTestFailed => "XSS_TEST_FAILED",
            Self::FieldNotFound => "FIELD_NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::ProxyConnectionFailed => "PROXY_CONNECTION_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PentestError
// ---------------------------------------------------------------------------

/// Unified error type for the trust kernel.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context (e.g.
/// `target`, `host`, `limit`). Every error also carries a `correlation_id`
/// so logs across Scope Guard, Browser Session Core, and Validator Core can
/// be joined for one logical operation.
pub struct PentestError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Correlation id threading this error back to the originating operation.
    pub correlation_id: Option<String>,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics (serialised deterministically).
    pub context: BTreeMap<String, serde_json::Value>,
}

impl PentestError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            correlation_id: None,
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Attach a key-value diagnostic. Serialisation failures are skipped
    /// silently rather than panicking the error path.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for PentestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("PentestError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref id) = self.correlation_id {
            d.field("correlation_id", id);
        }
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for PentestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PentestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Serialisable snapshot of a [`PentestError`], for the wire format in §6
/// (`{code, message, details?}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context, omitted entirely when empty.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl From<&PentestError> for ErrorDetails {
    fn from(err: &PentestError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            details: err.context.clone(),
        }
    }
}
