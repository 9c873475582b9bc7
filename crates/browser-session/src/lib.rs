//! Proxy-pinned browser session orchestration: a bounded session pool, a
//! page-oracle contract for natural-language DOM actions, and an XSS probe
//! engine. Every side-effecting operation is gated by a `ScopeGuard`.

pub mod core;
pub mod driver;
#[cfg(feature = "fantoccini-driver")]
pub mod fantoccini_driver;
pub mod oracle;
pub mod pool;
pub mod session;
pub mod xss;

#[cfg(feature = "fantoccini-driver")]
pub use fantoccini_driver::FantocciniDriver;

pub use core::{BrowserSessionCore, EvidenceKey, SessionError};
pub use driver::{ActOutcome, BrowserDriver, DialogEvent, NavigateOutcome, ProxyConnectionError, SessionOptions};
pub use oracle::{ActionType, OracleAction, OracleError, PageOracle};
pub use pool::{PoolStats, SessionLimit, SessionPool};
pub use session::{InvalidTransition, SessionLifecycle, SessionState};
pub use xss::{Payload, PayloadContext, ProbeReport, ReflectionKind};
