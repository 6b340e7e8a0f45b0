use serde::{Deserialize, Serialize};

use crate::metrics::EndpointSummary;

/// Pass/fail limits applied to the combined run and to each endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// p95 latency must stay strictly below this value.
    pub p95_latency_ms: f64,
    /// Error rate (fraction) must stay strictly below this value.
    pub max_error_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { p95_latency_ms: 1_500.0, max_error_rate: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMetric {
    P95Latency,
    ErrorRate,
}

impl ThresholdMetric {
    pub fn as_name(&self) -> &'static str {
        match self {
            ThresholdMetric::P95Latency => "p95 latency",
            ThresholdMetric::ErrorRate => "error rate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCheck {
    /// Endpoint id, or `all` for the combined summary.
    pub scope: String,
    pub metric: ThresholdMetric,
    pub observed: f64,
    pub limit: f64,
    pub passed: bool,
}

impl Thresholds {
    /// Check `summary` against both limits. A scope without requests passes.
    pub fn evaluate(&self, summary: &EndpointSummary) -> [ThresholdCheck; 2] {
        let check = |metric, observed: f64, limit: f64| ThresholdCheck {
            scope: summary.endpoint_id.clone(),
            metric,
            observed,
            limit,
            passed: summary.request_count == 0 || observed < limit,
        };
        [
            check(ThresholdMetric::P95Latency, summary.p95_latency_ms, self.p95_latency_ms),
            check(ThresholdMetric::ErrorRate, summary.error_rate, self.max_error_rate),
        ]
    }
}

pub fn all_passed(checks: &[ThresholdCheck]) -> bool {
    checks.iter().all(|c| c.passed)
}
