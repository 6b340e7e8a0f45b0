use abperf_client::{request_headers, RequestOutcome, Transport};
use abperf_common::{Endpoint, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::compare::{ComparisonEngine, Contender};
use crate::config::BenchConfig;
use crate::metrics::MetricRecorder;
use crate::report::{EndpointResult, RunReport};
use crate::scenario::ScenarioRunner;

/// Issue one request against `endpoint` and record its outcome.
///
/// Timeouts, connection failures and non-2xx statuses all count as one
/// failed sample; the cause is only logged.
pub async fn probe_once<T: Transport>(
    transport: &T,
    endpoint: &Endpoint,
    headers: &[(String, String)],
    timeout: Duration,
    recorder: &MetricRecorder,
) -> RequestOutcome {
    let outcome = transport.issue_request(&endpoint.url, headers, timeout).await;
    if !outcome.is_success() {
        debug!(endpoint = %endpoint.id, result = ?outcome.result, "request counted as failure");
    }
    recorder.record(&endpoint.id, outcome.duration_ms, outcome.is_success());
    outcome
}

/// Drive both endpoints with the configured ramp profile, concurrently, then
/// summarize, compare and evaluate thresholds.
pub async fn run<T, R>(config: &BenchConfig, transport: Arc<T>, runner: &R) -> Result<RunReport>
where
    T: Transport + 'static,
    R: ScenarioRunner,
{
    config.validate()?;
    let (first, second) = config.endpoint_pair()?;

    let recorder = MetricRecorder::new();
    let headers = Arc::new(request_headers(config.credentials.as_ref()));

    let scenario = |endpoint: &Endpoint| {
        let transport = Arc::clone(&transport);
        let endpoint = Arc::new(endpoint.clone());
        let headers = Arc::clone(&headers);
        let recorder = recorder.clone();
        let timeout = config.request_timeout;
        move || {
            let transport = Arc::clone(&transport);
            let endpoint = Arc::clone(&endpoint);
            let headers = Arc::clone(&headers);
            let recorder = recorder.clone();
            async move {
                probe_once(transport.as_ref(), &endpoint, &headers, timeout, &recorder).await;
            }
        }
    };

    info!(
        first = %first.url,
        second = %second.url,
        stages = config.stages.len(),
        "starting comparison run"
    );

    let (first_stats, second_stats) = tokio::join!(
        runner.run_scenario(&first.id, &config.stages, scenario(first)),
        runner.run_scenario(&second.id, &config.stages, scenario(second)),
    );
    debug!(?first_stats, ?second_stats, "both scenarios finished");

    let aggregator = recorder.finish(config.comparison.median_method)?;
    let first_summary = aggregator.summarize(&first.id);
    let second_summary = aggregator.summarize(&second.id);

    let engine = ComparisonEngine::new(config.comparison);
    let verdict = engine.compare(
        Contender { label: &first.name, summary: &first_summary },
        Contender { label: &second.name, summary: &second_summary },
    );
    info!(winner = %verdict.winner_label, classification = ?verdict.classification, "comparison complete");

    let mut thresholds = Vec::new();
    for summary in [&aggregator.summarize_all(), &first_summary, &second_summary] {
        thresholds.extend(config.thresholds.evaluate(summary));
    }

    Ok(RunReport {
        endpoints: [
            EndpointResult { endpoint: first.clone(), summary: first_summary },
            EndpointResult { endpoint: second.clone(), summary: second_summary },
        ],
        verdict,
        thresholds,
    })
}
