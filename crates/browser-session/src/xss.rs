//! Reflected/executed XSS probe engine (§4.2.2).

use crate::driver::BrowserDriver;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Context a payload is designed to break out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadContext {
    /// HTML body context, e.g. inside a `<div>`.
    Html,
    /// Inside an HTML attribute value.
    Attribute,
    /// A `javascript:`/`data:` URI context.
    Url,
}

/// A single probe payload, with its intended break-out context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Template containing a `{marker}` placeholder.
    pub template: String,
    /// The context this payload targets.
    pub context: PayloadContext,
}

/// The seed set of payload templates covering the contexts named in §4.2.2.
#[must_use]
pub fn seed_payloads() -> Vec<Payload> {
    vec![
        Payload { template: "<script>{marker}</script>".to_string(), context: PayloadContext::Html },
        Payload { template: "<img src=x onerror=\"{marker}\">".to_string(), context: PayloadContext::Html },
        Payload { template: "<svg onload=\"{marker}\">".to_string(), context: PayloadContext::Html },
        Payload { template: "\" onmouseover=\"{marker}".to_string(), context: PayloadContext::Attribute },
        Payload { template: "javascript:{marker}".to_string(), context: PayloadContext::Url },
        Payload { template: "\">{marker}".to_string(), context: PayloadContext::Attribute },
        Payload { template: "'>{marker}".to_string(), context: PayloadContext::Attribute },
    ]
}

/// Generate a fresh marker: `XSS_MARKER_<base36-random>_<unix-ms>`, unique
/// per probe invocation.
#[must_use]
pub fn generate_marker() -> String {
    let random: u64 = rand::thread_rng().gen();
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis();
    format!("XSS_MARKER_{}_{unix_ms}", to_base36(random))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ASCII")
}

fn script_style_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").expect("static regex compiles")
    })
}

fn attribute_value_re(marker: &str) -> Regex {
    let escaped = regex::escape(marker);
    Regex::new(&format!(r#"(?is)=\s*["'][^"']*{escaped}[^"']*["']"#)).expect("built from escaped marker")
}

/// How a single payload reflected back, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReflectionKind {
    /// A dialog fired and its text contained the marker.
    Executed,
    /// The marker appears in page text/nodes outside `<script>`/`<style>`.
    Reflected,
    /// The marker appears inside an attribute value.
    AttributeInjection,
    /// No trace of the marker was found.
    NotReflected,
}

/// Per-payload probe outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadResult {
    /// The rendered payload (marker substituted in).
    pub payload: String,
    /// How it reflected, if at all.
    pub kind: ReflectionKind,
}

/// Aggregate result of probing one field (§4.2.2's reported shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// The marker used for this probe invocation.
    pub marker: String,
    /// Every payload attempted, in order.
    pub payloads_tried: Vec<String>,
    /// Payloads whose marker triggered a captured dialog.
    pub executed: Vec<String>,
    /// Payloads whose marker reflected into page text/DOM.
    pub reflected: Vec<String>,
    /// Payloads whose marker landed inside an attribute value.
    pub attribute_injection: Vec<String>,
    /// Dialog messages captured across the whole probe.
    pub console_messages: Vec<String>,
    /// First captured dialog text, if any.
    pub dialog_text: Option<String>,
}

/// Classify how `marker` reflected in `html`, given any dialog text captured
/// for this payload.
fn classify(html: &str, marker: &str, dialog_texts: &[String]) -> ReflectionKind {
    if dialog_texts.iter().any(|t| t.contains(marker)) {
        return ReflectionKind::Executed;
    }

    if attribute_value_re(marker).is_match(html) {
        return ReflectionKind::AttributeInjection;
    }

    let stripped = script_style_strip_re().replace_all(html, "");
    if stripped.contains(marker) {
        return ReflectionKind::Reflected;
    }

    ReflectionKind::NotReflected
}

/// Probe one form field with the seed payload set (or a caller-supplied
/// override). Stops early on the first `EXECUTED` result if
/// `stop_on_first_executed` is set.
pub async fn probe_field(
    driver: &dyn BrowserDriver,
    form_selector: &str,
    field_selector: &str,
    payloads: Option<Vec<Payload>>,
    stop_on_first_executed: bool,
) -> anyhow::Result<ProbeReport> {
    let marker = generate_marker();
    let payloads = payloads.unwrap_or_else(seed_payloads);

    driver.install_dialog_listener().await?;

    let mut report = ProbeReport {
        marker: marker.clone(),
        payloads_tried: Vec::new(),
        executed: Vec::new(),
        reflected: Vec::new(),
        attribute_injection: Vec::new(),
        console_messages: Vec::new(),
        dialog_text: None,
    };

    for payload in &payloads {
        let rendered = payload.template.replace("{marker}", &marker);
        report.payloads_tried.push(rendered.clone());

        driver.fill(field_selector, &rendered).await?;
        driver.submit(form_selector).await?;

        let dialogs = driver.drain_dialog_events().await?;
        let dialog_texts: Vec<String> = dialogs.iter().map(|d| d.message.clone()).collect();
        report.console_messages.extend(dialog_texts.iter().cloned());
        if report.dialog_text.is_none() {
            report.dialog_text = dialog_texts.first().cloned();
        }

        let html = driver.page_html().await?;
        match classify(&html, &marker, &dialog_texts) {
            ReflectionKind::Executed => {
                report.executed.push(rendered.clone());
                if stop_on_first_executed {
                    break;
                }
            }
            ReflectionKind::Reflected => report.reflected.push(rendered.clone()),
            ReflectionKind::AttributeInjection => report.attribute_injection.push(rendered.clone()),
            ReflectionKind::NotReflected => {}
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_format_matches_spec() {
        let marker = generate_marker();
        assert!(marker.starts_with("XSS_MARKER_"));
        let rest = marker.strip_prefix("XSS_MARKER_").unwrap();
        let parts: Vec<&str> = rest.rsplitn(2, '_').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn markers_are_unique() {
        let a = generate_marker();
        let b = generate_marker();
        assert_ne!(a, b);
    }

    #[test]
    fn classifies_script_body_reflection_as_reflected() {
        let marker = "XSS_MARKER_abc_123";
        let html = format!("<div>hello {marker} world</div>");
        assert_eq!(classify(&html, marker, &[]), ReflectionKind::Reflected);
    }

    #[test]
    fn ignores_marker_inside_script_or_style_tags() {
        let marker = "XSS_MARKER_abc_123";
        let html = format!("<script>var x = \"{marker}\";</script><div>safe</div>");
        assert_eq!(classify(&html, marker, &[]), ReflectionKind::NotReflected);
    }

    #[test]
    fn classifies_attribute_injection() {
        let marker = "XSS_MARKER_abc_123";
        let html = format!(r#"<input value="{marker}">"#);
        assert_eq!(classify(&html, marker, &[]), ReflectionKind::AttributeInjection);
    }

    #[test]
    fn dialog_capture_takes_precedence_as_executed() {
        let marker = "XSS_MARKER_abc_123";
        let html = format!("<div>{marker}</div>");
        let dialogs = vec![marker.to_string()];
        assert_eq!(classify(&html, marker, &dialogs), ReflectionKind::Executed);
    }

    #[test]
    fn seed_payloads_cover_every_named_context() {
        let payloads = seed_payloads();
        assert!(payloads.iter().any(|p| p.context == PayloadContext::Html && p.template.contains("<script>")));
        assert!(payloads.iter().any(|p| p.context == PayloadContext::Html && p.template.contains("onerror")));
        assert!(payloads.iter().any(|p| p.context == PayloadContext::Html && p.template.contains("onload")));
        assert!(payloads.iter().any(|p| p.context == PayloadContext::Attribute && p.template.contains("onmouseover")));
        assert!(payloads.iter().any(|p| p.context == PayloadContext::Url && p.template.starts_with("javascript:")));
        assert!(payloads.iter().any(|p| p.template.starts_with("\">")));
        assert!(payloads.iter().any(|p| p.template.starts_with("'>")));
    }
}
