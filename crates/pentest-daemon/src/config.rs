//! Environment-derived daemon configuration (§6's "Environment inputs").

use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, merged from environment variables with typed
/// defaults. Construct with [`DaemonConfig::from_env`].
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path to the engagement contract file. Required; there is no default.
    pub scope_file: PathBuf,
    /// Whether a contract load/validation failure aborts startup.
    pub fail_closed: bool,
    /// Engagement identifier, threaded through audit events and evidence keys.
    pub engagement_id: String,
    /// Whether browser sessions run headless.
    pub headless: bool,
    /// Interception proxy URL every browser session is pinned to.
    pub burp_proxy_url: String,
    /// Directory evidence artifacts (screenshots, extraction dumps) are written to.
    pub evidence_dir: PathBuf,
    /// Default per-operation timeout.
    pub default_timeout: Duration,
    /// Maximum concurrently open browser sessions.
    pub max_sessions: usize,
    /// Whether Scope Guard validation is enforced at all (operator escape hatch).
    pub enable_scope_validation: bool,
}

/// Raised when a required or malformed environment variable prevents startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `SCOPE_FILE` was not set.
    #[error("SCOPE_FILE is required")]
    MissingScopeFile,
    /// A variable was set but could not be parsed as the expected type.
    #[error("{variable} is set to an invalid value: {value}")]
    InvalidValue {
        /// The variable name.
        variable: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
}

fn env_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue { variable: name, value: v }),
        },
    }
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue { variable: name, value: v }),
    }
}

impl DaemonConfig {
    /// Read configuration from the process environment, applying the
    /// defaults named in §6.
    pub fn from_env() -> Result<Self, ConfigError> {
        let scope_file = std::env::var("SCOPE_FILE").map_err(|_| ConfigError::MissingScopeFile)?;
        let engagement_id = std::env::var("ENGAGEMENT_ID").unwrap_or_else(|_| "unspecified".to_string());
        let burp_proxy_url = std::env::var("BURP_PROXY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let evidence_dir = std::env::var("EVIDENCE_DIR").unwrap_or_else(|_| "./evidence".to_string());

        Ok(Self {
            scope_file: PathBuf::from(scope_file),
            fail_closed: env_bool("FAIL_CLOSED", true)?,
            engagement_id,
            headless: env_bool("HEADLESS", true)?,
            burp_proxy_url,
            evidence_dir: PathBuf::from(evidence_dir),
            default_timeout: Duration::from_millis(env_u64("DEFAULT_TIMEOUT", 30_000)?),
            max_sessions: env_u64("MAX_SESSIONS", 4)? as usize,
            enable_scope_validation: env_bool("ENABLE_SCOPE_VALIDATION", true)?,
        })
    }
}
