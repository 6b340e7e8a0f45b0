use abperf_common::{AbPerfError, Result, ALL_ENDPOINTS_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of one completed (or timed-out) request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub latency_ms: f64,
    pub success: bool,
}

/// How the median is derived from the sorted latencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MedianMethod {
    /// Linear interpolation between closest ranks; an even count yields the
    /// mean of the two middle samples.
    #[default]
    Exact,
    /// The sample at index `floor(0.5 * n)`. Always an observed value; differs
    /// from `Exact` by at most half the gap between the two middle samples.
    NearestRank,
}

impl MedianMethod {
    fn median(self, sorted: &[f64]) -> f64 {
        match self {
            MedianMethod::Exact => percentile(sorted, 0.50),
            MedianMethod::NearestRank => nearest_rank(sorted, 0.50),
        }
    }
}

/// Append-only, concurrency-safe sample store shared by every worker.
///
/// Clones share the same storage. Call [`MetricRecorder::finish`] on the last
/// live handle once the scenarios are over.
#[derive(Debug, Clone, Default)]
pub struct MetricRecorder {
    samples: Arc<Mutex<HashMap<String, Vec<Sample>>>>,
}

impl MetricRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request outcome for `endpoint_id`. Never fails.
    pub fn record(&self, endpoint_id: &str, latency_ms: f64, success: bool) {
        let sample = Sample { latency_ms, success };
        let mut samples = self.lock();
        match samples.get_mut(endpoint_id) {
            Some(existing) => existing.push(sample),
            None => {
                samples.insert(endpoint_id.to_string(), vec![sample]);
            }
        }
    }

    /// Number of samples recorded so far for `endpoint_id`.
    pub fn sample_count(&self, endpoint_id: &str) -> usize {
        self.lock().get(endpoint_id).map_or(0, Vec::len)
    }

    /// Stop recording and hand every sample to an aggregator.
    ///
    /// Returns `RecorderInUse` while other handles are alive, since they
    /// could still append after the summaries were computed.
    pub fn finish(self, median: MedianMethod) -> Result<MetricsAggregator> {
        match Arc::try_unwrap(self.samples) {
            Ok(mutex) => {
                let samples = mutex.into_inner().unwrap_or_else(PoisonError::into_inner);
                Ok(MetricsAggregator::new(samples, median))
            }
            Err(shared) => Err(AbPerfError::RecorderInUse(Arc::strong_count(&shared) - 1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Sample>>> {
        // A worker that panicked mid-push leaves the map intact.
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Summary statistics for one endpoint. Latency fields cover successful and
/// failed requests alike.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSummary {
    pub endpoint_id: String,
    pub request_count: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub median_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate: f64,
}

impl EndpointSummary {
    /// Summary of an endpoint with no samples: every numeric field is zero.
    pub fn empty(endpoint_id: &str) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            request_count: 0,
            failures: 0,
            avg_latency_ms: 0.0,
            median_latency_ms: 0.0,
            min_latency_ms: 0.0,
            max_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            error_rate: 0.0,
        }
    }
}

/// Read-only view over the final sample set.
pub struct MetricsAggregator {
    samples: HashMap<String, Vec<Sample>>,
    median: MedianMethod,
}

impl MetricsAggregator {
    pub fn new(samples: HashMap<String, Vec<Sample>>, median: MedianMethod) -> Self {
        Self { samples, median }
    }

    pub fn summarize(&self, endpoint_id: &str) -> EndpointSummary {
        let samples = self.samples.get(endpoint_id).map(Vec::as_slice).unwrap_or(&[]);
        summarize_samples(endpoint_id, samples.iter(), self.median)
    }

    /// One summary over the samples of every endpoint, reported as [`ALL_ENDPOINTS_ID`].
    pub fn summarize_all(&self) -> EndpointSummary {
        summarize_samples(ALL_ENDPOINTS_ID, self.samples.values().flatten(), self.median)
    }
}

fn summarize_samples<'a>(
    endpoint_id: &str,
    samples: impl Iterator<Item = &'a Sample>,
    median: MedianMethod,
) -> EndpointSummary {
    let mut failures: u64 = 0;
    let mut latencies: Vec<f64> = Vec::new();
    for sample in samples {
        if !sample.success {
            failures += 1;
        }
        latencies.push(sample.latency_ms);
    }

    if latencies.is_empty() {
        return EndpointSummary::empty(endpoint_id);
    }

    latencies.sort_unstable_by(f64::total_cmp);
    let count = latencies.len();
    let sum: f64 = latencies.iter().sum();

    EndpointSummary {
        endpoint_id: endpoint_id.to_string(),
        request_count: count as u64,
        failures,
        avg_latency_ms: sum / count as f64,
        median_latency_ms: median.median(&latencies),
        min_latency_ms: latencies[0],
        max_latency_ms: latencies[count - 1],
        p95_latency_ms: percentile(&latencies, 0.95),
        error_rate: failures as f64 / count as f64,
    }
}

/// Percentile of an ascending slice with linear interpolation between the
/// two closest ranks. Returns 0 for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Element at index `floor(p * n)` of an ascending slice.
/// Returns 0 for an empty slice.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
