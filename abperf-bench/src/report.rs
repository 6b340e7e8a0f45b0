use abperf_common::{AbPerfError, Endpoint, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compare::Verdict;
use crate::metrics::EndpointSummary;
use crate::thresholds::{all_passed, ThresholdCheck, ThresholdMetric};

/// Total width of the console report.
pub const REPORT_WIDTH: usize = 66;
/// Width of the right-aligned value column.
const VALUE_WIDTH: usize = 10;
/// Width of the `Label:` column in front of each value.
const LABEL_WIDTH: usize = 20;

/// One endpoint together with its final summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResult {
    pub endpoint: Endpoint,
    pub summary: EndpointSummary,
}

/// Everything produced by one comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Positional order of the configuration; `[0]` is `endpoint1`.
    pub endpoints: [EndpointResult; 2],
    pub verdict: Verdict,
    pub thresholds: Vec<ThresholdCheck>,
}

impl RunReport {
    pub fn thresholds_passed(&self) -> bool {
        all_passed(&self.thresholds)
    }
}

/// Machine-readable result, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonDocument {
    pub endpoint1: EndpointDocument,
    pub endpoint2: EndpointDocument,
    pub comparison: DifferenceDocument,
    pub winner: String,
    pub winner_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDocument {
    pub url: String,
    pub requests: u64,
    pub avg_response_time: String,
    pub median_response_time: String,
    pub min_response_time: String,
    pub max_response_time: String,
    pub p95_response_time: String,
    pub error_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceDocument {
    pub avg_difference: String,
    pub avg_difference_percent: String,
}

impl EndpointDocument {
    fn new(result: &EndpointResult) -> Self {
        let s = &result.summary;
        Self {
            url: result.endpoint.url.clone(),
            requests: s.request_count,
            avg_response_time: format_ms(s.avg_latency_ms),
            median_response_time: format_ms(s.median_latency_ms),
            min_response_time: format_ms(s.min_latency_ms),
            max_response_time: format_ms(s.max_latency_ms),
            p95_response_time: format_ms(s.p95_latency_ms),
            error_rate: format_percent(s.error_rate * 100.0),
        }
    }
}

/// Build the structured document for `report`.
pub fn document(report: &RunReport) -> ComparisonDocument {
    let [first, second] = &report.endpoints;
    ComparisonDocument {
        endpoint1: EndpointDocument::new(first),
        endpoint2: EndpointDocument::new(second),
        comparison: DifferenceDocument {
            avg_difference: format_ms(report.verdict.avg_diff_ms),
            avg_difference_percent: format_percent(report.verdict.avg_diff_percent),
        },
        winner: report.verdict.winner_label.clone(),
        winner_reason: report.verdict.reason.clone(),
    }
}

/// Serialize `doc` as pretty JSON to `path`.
pub fn write_document(doc: &ComparisonDocument, path: &Path) -> Result<()> {
    let write_err = |e: String| AbPerfError::ReportWrite(path.display().to_string(), e);
    let json = serde_json::to_string_pretty(doc).map_err(|e| write_err(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| write_err(e.to_string()))
}

/// Render the fixed-width console report. Every line fits in [`REPORT_WIDTH`].
pub fn render_text(report: &RunReport) -> String {
    let banner = "═".repeat(REPORT_WIDTH);
    let mut lines = vec![banner.clone(), "PERFORMANCE COMPARISON".to_string(), banner.clone()];

    for result in &report.endpoints {
        lines.extend(endpoint_block(result));
        lines.push(banner.clone());
    }

    let verdict = &report.verdict;
    lines.push(" Comparison:".to_string());
    lines.push(format!(
        "{} ({})",
        metric_line("Avg Difference", &format!("{:.2}", verdict.avg_diff_ms), "ms"),
        format_percent(verdict.avg_diff_percent),
    ));
    lines.push(banner.clone());
    lines.extend(wrap_field(" Winner: ", &verdict.winner_label));
    lines.extend(wrap_field(" Reason: ", &verdict.reason));
    lines.push(banner);

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Render the threshold checks and the overall PASS/FAIL line.
pub fn render_thresholds(checks: &[ThresholdCheck]) -> String {
    let mut text = String::from("Thresholds\n");
    for check in checks {
        let (observed, limit) = match check.metric {
            ThresholdMetric::P95Latency => {
                (format_ms(check.observed), format_ms(check.limit))
            }
            ThresholdMetric::ErrorRate => {
                (format_percent(check.observed * 100.0), format_percent(check.limit * 100.0))
            }
        };
        let scope = truncate(&check.scope, 12);
        text.push_str(&format!(
            " {:<12} {:<12} {:>12}  [< {:>10}]  {}\n",
            scope,
            check.metric.as_name(),
            observed,
            limit,
            if check.passed { "✓" } else { "✗" },
        ));
    }
    text.push_str(&format!("Result: {}\n", if all_passed(checks) { "PASS" } else { "FAIL" }));
    text
}

fn endpoint_block(result: &EndpointResult) -> Vec<String> {
    let s = &result.summary;
    let name = truncate(&result.endpoint.name, REPORT_WIDTH / 2);
    // " {name}: {url}"
    let url_width = REPORT_WIDTH.saturating_sub(name.chars().count() + 3);
    vec![
        format!(" {}: {}", name, truncate(&result.endpoint.url, url_width)),
        metric_line("Requests", &s.request_count.to_string(), ""),
        metric_line("Avg Response Time", &format!("{:.2}", s.avg_latency_ms), "ms"),
        metric_line("Median", &format!("{:.2}", s.median_latency_ms), "ms"),
        metric_line("Min", &format!("{:.2}", s.min_latency_ms), "ms"),
        metric_line("Max", &format!("{:.2}", s.max_latency_ms), "ms"),
        metric_line("Error Rate", &format!("{:.1}", s.error_rate * 100.0), "%"),
    ]
}

fn metric_line(label: &str, value: &str, suffix: &str) -> String {
    format!(
        "   {:<lw$}{:>vw$}{}",
        format!("{label}:"),
        value,
        suffix,
        lw = LABEL_WIDTH,
        vw = VALUE_WIDTH,
    )
}

/// Word-wrap `text` after `prefix`, indenting continuation lines to match.
fn wrap_field(prefix: &str, text: &str) -> Vec<String> {
    let indent = " ".repeat(prefix.chars().count());
    let width = REPORT_WIDTH.saturating_sub(indent.len()).max(1);

    let mut rows: Vec<String> = Vec::new();
    let mut row = String::new();
    for word in text.split_whitespace() {
        let word = truncate(word, width);
        let needed = if row.is_empty() { 0 } else { row.chars().count() + 1 };
        if needed + word.chars().count() > width && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
        }
        if !row.is_empty() {
            row.push(' ');
        }
        row.push_str(&word);
    }
    rows.push(row);

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| if i == 0 { format!("{prefix}{row}") } else { format!("{indent}{row}") })
        .collect()
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

/// `123.456` → `"123.46ms"`
pub fn format_ms(value: f64) -> String {
    format!("{value:.2}ms")
}

/// `23.077` → `"23.1%"`
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Parse a string produced by [`format_ms`].
pub fn parse_ms(s: &str) -> Option<f64> {
    s.strip_suffix("ms")?.parse().ok()
}

/// Parse a string produced by [`format_percent`].
pub fn parse_percent(s: &str) -> Option<f64> {
    s.strip_suffix('%')?.parse().ok()
}
