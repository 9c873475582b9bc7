//! Token-bucket rate limiting and request budget enforcement (§4.1.2).

use crate::contract::Constraints;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering::Relaxed};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Which budget dimension was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    /// `constraints.budget.maxTotalRequests`.
    TotalRequests,
    /// `constraints.budget.maxPerTarget`.
    PerTarget,
    /// `constraints.budget.maxDurationHours`.
    Duration,
    /// `constraints.rate.maxConcurrent`.
    Concurrency,
    /// `constraints.rate.rps` / `burst`, the token bucket ran dry.
    Rate,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TotalRequests => "maxTotalRequests",
            Self::PerTarget => "maxPerTarget",
            Self::Duration => "maxDurationHours",
            Self::Concurrency => "maxConcurrent",
            Self::Rate => "rate",
        };
        write!(f, "{s}")
    }
}

/// Raised when a consume/enter call would exceed a configured budget.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} budget exceeded: current {current}, limit {limit}")]
pub struct BudgetExceeded {
    /// Which dimension was exceeded.
    pub kind: BudgetKind,
    /// Current usage at the time of the check.
    pub current: f64,
    /// Configured limit for that dimension.
    pub limit: f64,
}

/// Point-in-time snapshot of all budget dimensions, for `status` (§4.1's
/// `status` operation).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    /// Requests consumed so far across the whole engagement.
    pub total_requests: u64,
    /// Configured cap on total requests.
    pub max_total_requests: u64,
    /// Requests currently in flight.
    pub in_flight: u32,
    /// Configured concurrency cap.
    pub max_concurrent: u32,
    /// Wall-clock time elapsed since the ledger started tracking duration.
    #[serde(with = "pentest_duration::duration_millis")]
    pub elapsed: Duration,
    /// Configured engagement duration cap.
    #[serde(with = "pentest_duration::duration_millis")]
    pub max_duration: Duration,
    /// Per-target request counts, highest first is not guaranteed.
    pub per_target: BTreeMap<String, u64>,
}

struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self, weight: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);

        if self.tokens >= weight {
            self.tokens -= weight;
            true
        } else {
            false
        }
    }
}

/// Thread-safe ledger tracking rate, concurrency, and absolute request
/// budgets for one engagement.
pub struct BudgetLedger {
    max_total_requests: u64,
    max_per_target: u64,
    max_duration: Duration,
    max_concurrent: u32,

    total_requests: AtomicU64,
    in_flight: AtomicU32,
    per_target: Mutex<BTreeMap<String, u64>>,
    bucket: Mutex<TokenBucket>,
    start: Instant,
}

impl fmt::Debug for BudgetLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetLedger")
            .field("total_requests", &self.total_requests.load(Relaxed))
            .field("in_flight", &self.in_flight.load(Relaxed))
            .field("max_total_requests", &self.max_total_requests)
            .finish()
    }
}

impl BudgetLedger {
    /// Build a ledger from a contract's `constraints` block. Starts its
    /// duration clock immediately.
    #[must_use]
    pub fn from_constraints(constraints: &Constraints) -> Self {
        Self {
            max_total_requests: constraints.budget.max_total_requests,
            max_per_target: constraints.budget.max_per_target,
            max_duration: Duration::from_secs_f64(constraints.budget.max_duration_hours * 3600.0),
            max_concurrent: constraints.rate.max_concurrent,
            total_requests: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
            per_target: Mutex::new(BTreeMap::new()),
            bucket: Mutex::new(TokenBucket::new(
                constraints.rate.burst as f64,
                constraints.rate.rps,
            )),
            start: Instant::now(),
        }
    }

    /// Consume `weight` units of budget against `target_host`. Checks, in
    /// order: engagement duration, the rate-limiting token bucket, the
    /// total request cap, and the per-target cap. The first violated
    /// dimension is reported and no counters are incremented — the debit is
    /// rolled back rather than applied partially.
    pub fn consume(&self, target_host: &str, weight: u64) -> Result<(), BudgetExceeded> {
        let elapsed = self.start.elapsed();
        if elapsed > self.max_duration {
            return Err(BudgetExceeded {
                kind: BudgetKind::Duration,
                current: elapsed.as_secs_f64(),
                limit: self.max_duration.as_secs_f64(),
            });
        }

        if !self
            .bucket
            .lock()
            .expect("bucket lock poisoned")
            .try_take(weight as f64)
        {
            return Err(BudgetExceeded {
                kind: BudgetKind::Rate,
                current: 0.0,
                limit: weight as f64,
            });
        }

        let total_before = self.total_requests.load(Relaxed);
        if total_before + weight > self.max_total_requests {
            return Err(BudgetExceeded {
                kind: BudgetKind::TotalRequests,
                current: total_before as f64,
                limit: self.max_total_requests as f64,
            });
        }

        {
            let per_target = self.per_target.lock().expect("per_target lock poisoned");
            let current = per_target.get(target_host).copied().unwrap_or(0);
            if current + weight > self.max_per_target {
                return Err(BudgetExceeded {
                    kind: BudgetKind::PerTarget,
                    current: current as f64,
                    limit: self.max_per_target as f64,
                });
            }
        }

        self.total_requests.fetch_add(weight, Relaxed);
        *self
            .per_target
            .lock()
            .expect("per_target lock poisoned")
            .entry(target_host.to_string())
            .or_insert(0) += weight;

        Ok(())
    }

    /// Reserve one concurrency slot. Call [`exit_in_flight`](Self::exit_in_flight)
    /// when the operation completes, regardless of outcome.
    pub fn enter_in_flight(&self) -> Result<(), BudgetExceeded> {
        loop {
            let current = self.in_flight.load(Relaxed);
            if current >= self.max_concurrent {
                return Err(BudgetExceeded {
                    kind: BudgetKind::Concurrency,
                    current: current as f64,
                    limit: self.max_concurrent as f64,
                });
            }
            if self
                .in_flight
                .compare_exchange(current, current + 1, Relaxed, Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Release a concurrency slot reserved by [`enter_in_flight`](Self::enter_in_flight).
    pub fn exit_in_flight(&self) {
        self.in_flight.fetch_update(Relaxed, Relaxed, |v| Some(v.saturating_sub(1))).ok();
    }

    /// Point-in-time snapshot of every tracked dimension.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            total_requests: self.total_requests.load(Relaxed),
            max_total_requests: self.max_total_requests,
            in_flight: self.in_flight.load(Relaxed),
            max_concurrent: self.max_concurrent,
            elapsed: self.start.elapsed(),
            max_duration: self.max_duration,
            per_target: self.per_target.lock().expect("per_target lock poisoned").clone(),
        }
    }
}
