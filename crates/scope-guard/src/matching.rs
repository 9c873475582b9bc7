//! Target parsing and scope decision (§4.1.1, §4.1.4).

use crate::contract::{Allowlist, Denylist, EngagementContract};
use ipnetwork::IpNetwork;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("static regex compiles")
    })
}

/// A request target broken into its scope-relevant parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The host component: a domain name or an IP address literal.
    pub host: Host,
    /// Port, if explicit or inferable from a URL scheme.
    pub port: Option<u16>,
    /// Path component, for keyword matching. Empty for non-URL targets.
    pub path: String,
}

/// The parsed form of a target's host component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// A domain name, lowercased.
    Domain(String),
    /// An IP address literal.
    Ip(IpAddr),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Domain(d) => write!(f, "{d}"),
            Host::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// Error returned when a raw string cannot be parsed into a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTarget {
    /// The raw input that failed to parse.
    pub input: String,
}

impl fmt::Display for InvalidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid URL, IP address, or domain name", self.input)
    }
}

impl std::error::Error for InvalidTarget {}

/// Parse a raw target string using the five-step order: URL, IPv4, bracketed
/// or bare IPv6, domain, else invalid.
pub fn parse_target(raw: &str) -> Result<Target, InvalidTarget> {
    let trimmed = raw.trim();

    if trimmed.contains("://") {
        return parse_url_target(trimmed);
    }

    if let Ok(ip) = trimmed.parse::<std::net::Ipv4Addr>() {
        return Ok(Target {
            host: Host::Ip(IpAddr::V4(ip)),
            port: None,
            path: String::new(),
        });
    }

    if let Some(stripped) = trimmed.strip_prefix('[') {
        if let Some(rest) = stripped.strip_suffix(']') {
            if let Ok(ip) = rest.parse::<std::net::Ipv6Addr>() {
                return Ok(Target {
                    host: Host::Ip(IpAddr::V6(ip)),
                    port: None,
                    path: String::new(),
                });
            }
        }
    }
    if let Ok(ip) = trimmed.parse::<std::net::Ipv6Addr>() {
        return Ok(Target {
            host: Host::Ip(IpAddr::V6(ip)),
            port: None,
            path: String::new(),
        });
    }

    if domain_re().is_match(trimmed) {
        return Ok(Target {
            host: Host::Domain(trimmed.to_ascii_lowercase()),
            port: None,
            path: String::new(),
        });
    }

    Err(InvalidTarget { input: raw.to_string() })
}

fn parse_url_target(raw: &str) -> Result<Target, InvalidTarget> {
    let parsed = url::Url::parse(raw).map_err(|_| InvalidTarget { input: raw.to_string() })?;
    let host_str = parsed.host_str().ok_or_else(|| InvalidTarget { input: raw.to_string() })?;

    let host = if let Ok(ip) = host_str.parse::<IpAddr>() {
        Host::Ip(ip)
    } else {
        Host::Domain(host_str.to_ascii_lowercase())
    };

    let port = parsed.port_or_known_default();

    Ok(Target {
        host,
        port,
        path: parsed.path().to_ascii_lowercase(),
    })
}

/// Returns `true` if `pattern` matches `domain`.
///
/// Exact patterns match only themselves. A `*.suffix` pattern matches any
/// strict subdomain of `suffix` but never `suffix` itself bare — `*.x.com`
/// matches `a.x.com` but not `x.com`.
pub fn domain_matches(pattern: &str, domain: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => {
            domain.len() > suffix.len()
                && domain.ends_with(suffix)
                && domain.as_bytes()[domain.len() - suffix.len() - 1] == b'.'
        }
        None => pattern == domain,
    }
}

/// The outcome of a scope decision, including which rule fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The target is in scope. `matched_rule` describes which allowlist
    /// entry admitted it.
    Allow { matched_rule: String },
    /// The target is out of scope. `matched_rule` describes which rule
    /// rejected it (a denylist entry, or "no allowlist match").
    Deny { matched_rule: String },
}

impl Decision {
    /// `true` if this decision allows the target.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// The rule string describing why this decision was reached.
    #[must_use]
    pub fn matched_rule(&self) -> &str {
        match self {
            Decision::Allow { matched_rule } | Decision::Deny { matched_rule } => matched_rule,
        }
    }
}

/// Evaluate a target against a contract's allow/deny lists.
///
/// Deny wins: denylist domains, IP ranges, ports, and path keywords are all
/// checked before the allowlist is consulted at all.
pub fn evaluate(contract: &EngagementContract, target: &Target) -> Decision {
    if let Some(deny) = &contract.denylist {
        if let Some(rule) = deny_hit(deny, target) {
            return Decision::Deny { matched_rule: rule };
        }
    }

    allow_hit(&contract.allowlist, target)
}

fn deny_hit(deny: &Denylist, target: &Target) -> Option<String> {
    match &target.host {
        Host::Domain(domain) => {
            for pattern in &deny.domains {
                if domain_matches(pattern, domain) {
                    return Some(format!("denylist.domains: {pattern}"));
                }
            }
        }
        Host::Ip(ip) => {
            for cidr in &deny.ip_ranges {
                if let Ok(net) = cidr.parse::<IpNetwork>() {
                    if net.contains(*ip) {
                        return Some(format!("denylist.ipRanges: {cidr}"));
                    }
                }
            }
        }
    }

    if let Some(port) = target.port {
        if deny.ports.contains(&port) {
            return Some(format!("denylist.ports: {port}"));
        }
    }

    if !target.path.is_empty() {
        for keyword in &deny.path_keywords {
            if target.path.contains(keyword.as_str()) {
                return Some(format!("denylist.pathKeywords: {keyword}"));
            }
        }
    }

    None
}

fn allow_hit(allow: &Allowlist, target: &Target) -> Decision {
    let host_ok = match &target.host {
        Host::Domain(domain) => allow
            .domains
            .iter()
            .find(|p| domain_matches(p, domain))
            .map(|p| format!("allowlist.domains: {p}")),
        Host::Ip(ip) => allow
            .ip_ranges
            .iter()
            .find(|cidr| cidr.parse::<IpNetwork>().map(|n| n.contains(*ip)).unwrap_or(false))
            .map(|cidr| format!("allowlist.ipRanges: {cidr}")),
    };

    let Some(rule) = host_ok else {
        return Decision::Deny {
            matched_rule: "no allowlist entry matched the host".to_string(),
        };
    };

    if !allow.ports.is_empty() {
        let Some(port) = target.port else {
            return Decision::Deny {
                matched_rule: "allowlist.ports restricts ports but target has none".to_string(),
            };
        };
        if !allow.ports.contains(&port) {
            return Decision::Deny {
                matched_rule: format!("allowlist.ports does not include {port}"),
            };
        }
    }

    Decision::Allow { matched_rule: rule }
}
