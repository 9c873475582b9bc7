//! Output formatting for the pentest CLI.

use scope_guard::BudgetSnapshot;
use std::fmt;
use std::str::FromStr;
use validator_core::{ConfidenceScore, Recommendation};

/// Supported output formats for CLI display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Human-readable multi-line text.
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Text => "text",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

fn recommendation_str(r: Recommendation) -> &'static str {
    match r {
        Recommendation::Promote => "promote",
        Recommendation::Investigate => "investigate",
        Recommendation::Dismiss => "dismiss",
    }
}

/// Format a [`BudgetSnapshot`] for the `status` subcommand.
#[must_use]
pub fn format_budget_snapshot(snapshot: &BudgetSnapshot, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot).unwrap_or_default(),
        OutputFormat::Text => {
            let mut lines = vec![
                format!("requests      {}/{}", snapshot.total_requests, snapshot.max_total_requests),
                format!("in_flight     {}/{}", snapshot.in_flight, snapshot.max_concurrent),
                format!("elapsed       {}s / {}s", snapshot.elapsed.as_secs(), snapshot.max_duration.as_secs()),
            ];
            for (target, count) in &snapshot.per_target {
                lines.push(format!("  {target:<20} {count}"));
            }
            lines.join("\n")
        }
    }
}

/// Format a [`ConfidenceScore`] for the `replay-finding` subcommand.
#[must_use]
pub fn format_confidence_score(score: &ConfidenceScore, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(score).unwrap_or_default(),
        OutputFormat::Text => {
            let mut lines = vec![
                format!("recommendation   {}", recommendation_str(score.recommendation)),
                format!("overall          {:.2}", score.overall),
                format!("repro_score      {:.2}", score.repro_score),
                format!("neg_score        {:.2}", score.neg_score),
                format!("xid_score        {:.2}", score.xid_score),
            ];
            for factor in &score.factors {
                lines.push(format!("  - {factor}"));
            }
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_roundtrips() {
        for fmt in [OutputFormat::Json, OutputFormat::Text] {
            let parsed: OutputFormat = fmt.to_string().parse().unwrap();
            assert_eq!(parsed, fmt);
        }
    }

    #[test]
    fn output_format_rejects_unknown() {
        assert!("nope".parse::<OutputFormat>().is_err());
    }
}
