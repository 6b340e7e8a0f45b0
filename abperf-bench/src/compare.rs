use serde::{Deserialize, Serialize};

use crate::metrics::{EndpointSummary, MedianMethod};

/// Scoring and significance policy for [`ComparisonEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Weight of the mean latency in the score.
    pub avg_weight: f64,
    /// Weight of the median latency in the score; damps a few slow outliers.
    pub median_weight: f64,
    /// Average-latency gap (percent) a winner must exceed to be significant.
    pub significance_percent: f64,
    pub median_method: MedianMethod,
    /// When set, a latency winner whose error rate exceeds the loser's by more
    /// than this fraction is reported as less reliable instead of faster.
    /// `None` keeps error rate out of the decision entirely.
    pub max_error_rate_gap: Option<f64>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            avg_weight: 0.7,
            median_weight: 0.3,
            significance_percent: 2.0,
            median_method: MedianMethod::Exact,
            max_error_rate_gap: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Faster on both avg and median, and the avg gap exceeds the threshold.
    ClearWinner,
    /// Faster avg, but the gap is below the threshold.
    Marginal,
    /// Faster avg beyond the threshold, but the median disagrees.
    MixedSignal,
    /// Faster, but failing noticeably more often than the other endpoint.
    LessReliable,
    /// The better score is not backed by a faster avg.
    Similar,
}

/// One side of a comparison: its display label and its summary.
#[derive(Debug, Clone, Copy)]
pub struct Contender<'a> {
    pub label: &'a str,
    pub summary: &'a EndpointSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub winner_id: String,
    pub winner_label: String,
    pub reason: String,
    pub classification: Classification,
    pub avg_diff_ms: f64,
    /// In `[0, 100]`; 0 when both averages are 0.
    pub avg_diff_percent: f64,
    /// `(second.avg / best.avg - 1) * 100`, set for clear winners only.
    pub improvement_percent: Option<f64>,
}

pub struct ComparisonEngine {
    config: ComparisonConfig,
}

impl ComparisonEngine {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Lower is better.
    pub fn score(&self, summary: &EndpointSummary) -> f64 {
        self.config.avg_weight * summary.avg_latency_ms
            + self.config.median_weight * summary.median_latency_ms
    }

    /// Decide which contender performed better.
    ///
    /// On an exact score tie `b` is treated as the best and `a` as the
    /// runner-up, so swapping the arguments flips a tied result.
    pub fn compare(&self, a: Contender<'_>, b: Contender<'_>) -> Verdict {
        let (best, second) = if self.score(a.summary) < self.score(b.summary) {
            (a, b)
        } else {
            (b, a)
        };

        let best_avg = best.summary.avg_latency_ms;
        let second_avg = second.summary.avg_latency_ms;
        let avg_diff_ms = (best_avg - second_avg).abs();
        let avg_diff_percent = percent_of(avg_diff_ms, best_avg.max(second_avg));

        let faster_avg = best_avg < second_avg;
        let faster_median = best.summary.median_latency_ms < second.summary.median_latency_ms;
        let threshold = self.config.significance_percent;

        let classification = if faster_avg && faster_median && avg_diff_percent > threshold {
            Classification::ClearWinner
        } else if faster_avg && avg_diff_percent < threshold {
            Classification::Marginal
        } else if faster_avg {
            Classification::MixedSignal
        } else {
            Classification::Similar
        };

        let classification = match classification {
            Classification::ClearWinner | Classification::MixedSignal
                if self.less_reliable(best.summary, second.summary) =>
            {
                Classification::LessReliable
            }
            other => other,
        };

        let improvement_percent = (classification == Classification::ClearWinner).then(|| {
            if best_avg > 0.0 {
                (second_avg / best_avg - 1.0) * 100.0
            } else {
                avg_diff_percent
            }
        });

        let (winner_label, reason) = match classification {
            Classification::ClearWinner => (
                best.label.to_string(),
                format!(
                    "Faster avg ({:.1}% faster) and median, statistically significant",
                    improvement_percent.unwrap_or(avg_diff_percent)
                ),
            ),
            Classification::Marginal => (
                format!("{} (marginally faster, within variance)", best.label),
                format!("Only {avg_diff_percent:.1}% difference - results may vary between runs"),
            ),
            Classification::MixedSignal => (
                format!("{} (faster avg)", best.label),
                format!("{avg_diff_percent:.1}% faster on average"),
            ),
            Classification::LessReliable => (
                format!("{} (faster but less reliable)", best.label),
                format!(
                    "{:.1}% faster on average, but error rate {:.1}% vs {:.1}%",
                    avg_diff_percent,
                    best.summary.error_rate * 100.0,
                    second.summary.error_rate * 100.0,
                ),
            ),
            Classification::Similar => (
                best.label.to_string(),
                "Very similar performance - differences may be due to variance".to_string(),
            ),
        };

        Verdict {
            winner_id: best.summary.endpoint_id.clone(),
            winner_label,
            reason,
            classification,
            avg_diff_ms,
            avg_diff_percent,
            improvement_percent,
        }
    }

    fn less_reliable(&self, best: &EndpointSummary, second: &EndpointSummary) -> bool {
        self.config
            .max_error_rate_gap
            .is_some_and(|gap| best.error_rate - second.error_rate > gap)
    }
}

/// `part / whole * 100`, or 0 when `whole` is not positive.
fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
