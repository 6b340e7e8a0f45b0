use abperf_bench::metrics::{
    nearest_rank, percentile, EndpointSummary, MedianMethod, MetricRecorder, MetricsAggregator,
};
use abperf_common::AbPerfError;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

fn aggregate(samples: &[(&str, f64, bool)], median: MedianMethod) -> MetricsAggregator {
    let recorder = MetricRecorder::new();
    for &(id, latency, success) in samples {
        recorder.record(id, latency, success);
    }
    recorder.finish(median).expect("recorder has a single handle")
}

// --- MetricRecorder ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recording_loses_and_duplicates_nothing() {
    const WORKERS: usize = 16;
    const PER_WORKER: usize = 500;

    let recorder = MetricRecorder::new();
    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let recorder = recorder.clone();
            tokio::spawn(async move {
                for i in 0..PER_WORKER {
                    recorder.record("endpoint1", (w * PER_WORKER + i) as f64, i % 10 != 0);
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(recorder.sample_count("endpoint1"), WORKERS * PER_WORKER);
    let summary = recorder.finish(MedianMethod::Exact).unwrap().summarize("endpoint1");
    assert_eq!(summary.request_count, (WORKERS * PER_WORKER) as u64);
    assert_eq!(summary.failures, (WORKERS * PER_WORKER / 10) as u64);
    // Every latency value was distinct: 0..N-1.
    assert_eq!(summary.min_latency_ms, 0.0);
    assert_eq!(summary.max_latency_ms, (WORKERS * PER_WORKER - 1) as f64);
}

#[test]
fn test_record_keeps_endpoints_apart() {
    let recorder = MetricRecorder::new();
    recorder.record("endpoint1", 10.0, true);
    recorder.record("endpoint2", 20.0, false);
    recorder.record("endpoint2", 30.0, true);
    assert_eq!(recorder.sample_count("endpoint1"), 1);
    assert_eq!(recorder.sample_count("endpoint2"), 2);
    assert_eq!(recorder.sample_count("unknown"), 0);
}

#[test]
fn test_finish_fails_while_other_handles_alive() {
    let recorder = MetricRecorder::new();
    let worker_a = recorder.clone();
    let worker_b = recorder.clone();
    worker_a.record("endpoint1", 1.0, true);

    let err = recorder.finish(MedianMethod::Exact).err();
    assert_eq!(err, Some(AbPerfError::RecorderInUse(2)));

    drop(worker_b);
    let aggregator = worker_a.finish(MedianMethod::Exact).unwrap();
    assert_eq!(aggregator.summarize("endpoint1").request_count, 1);
}

// --- MetricsAggregator ---

#[test]
fn test_summary_statistics() {
    let agg = aggregate(
        &[
            ("e", 40.0, true),
            ("e", 10.0, true),
            ("e", 30.0, false),
            ("e", 20.0, true),
            ("e", 100.0, false),
        ],
        MedianMethod::Exact,
    );
    let s = agg.summarize("e");
    assert_eq!(s.endpoint_id, "e");
    assert_eq!(s.request_count, 5);
    assert_eq!(s.failures, 2);
    assert_eq!(s.avg_latency_ms, 40.0);
    assert_eq!(s.median_latency_ms, 30.0);
    assert_eq!(s.min_latency_ms, 10.0);
    assert_eq!(s.max_latency_ms, 100.0);
    assert_eq!(s.error_rate, 0.4);
}

#[test]
fn test_failed_requests_count_in_latency_stats() {
    // A timed-out request still contributes its latency.
    let agg = aggregate(&[("e", 10.0, true), ("e", 30_000.0, false)], MedianMethod::Exact);
    let s = agg.summarize("e");
    assert_eq!(s.max_latency_ms, 30_000.0);
    assert_eq!(s.avg_latency_ms, 15_005.0);
    assert_eq!(s.error_rate, 0.5);
}

#[test]
fn test_empty_endpoint_yields_zero_summary() {
    let agg = aggregate(&[("other", 5.0, true)], MedianMethod::Exact);
    let s = agg.summarize("endpoint1");
    assert_eq!(s, EndpointSummary::empty("endpoint1"));
    assert_eq!(s.request_count, 0);
    assert_eq!(s.avg_latency_ms, 0.0);
    assert_eq!(s.median_latency_ms, 0.0);
    assert_eq!(s.min_latency_ms, 0.0);
    assert_eq!(s.max_latency_ms, 0.0);
    assert_eq!(s.p95_latency_ms, 0.0);
    assert_eq!(s.error_rate, 0.0);
}

#[test]
fn test_exact_median_even_count_averages_middle_pair() {
    let agg = aggregate(
        &[("e", 10.0, true), ("e", 20.0, true), ("e", 30.0, true), ("e", 40.0, true)],
        MedianMethod::Exact,
    );
    assert_eq!(agg.summarize("e").median_latency_ms, 25.0);
}

#[test]
fn test_nearest_rank_median_returns_observed_sample() {
    // floor(0.5 * 4) = 2 → 30
    let agg = aggregate(
        &[("e", 10.0, true), ("e", 20.0, true), ("e", 30.0, true), ("e", 40.0, true)],
        MedianMethod::NearestRank,
    );
    assert_eq!(agg.summarize("e").median_latency_ms, 30.0);
}

#[test]
fn test_nearest_rank_error_bounded_by_middle_gap() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut latencies: Vec<f64> = (0..101).map(|i| (i * i) as f64 / 7.0).collect();
    latencies.shuffle(&mut rng);

    let mut sorted = latencies.clone();
    sorted.sort_by(f64::total_cmp);
    let exact = percentile(&sorted, 0.5);
    let approx = nearest_rank(&sorted, 0.5);
    let mid = sorted.len() / 2;
    let gap = sorted[mid] - sorted[mid - 1];
    assert!((exact - approx).abs() <= gap);
}

#[test]
fn test_median_independent_of_insertion_order() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut values: Vec<f64> = (1..=99).map(f64::from).collect();
    values.shuffle(&mut rng);

    let samples: Vec<(&str, f64, bool)> = values.iter().map(|&v| ("e", v, true)).collect();
    let s = aggregate(&samples, MedianMethod::Exact).summarize("e");
    assert_eq!(s.median_latency_ms, 50.0);
    assert_eq!(s.min_latency_ms, 1.0);
    assert_eq!(s.max_latency_ms, 99.0);
    assert_eq!(s.avg_latency_ms, 50.0);
}

#[test]
fn test_p95() {
    // 1..=101: rank 0.95 * 100 = 95 → 96
    let samples: Vec<(&str, f64, bool)> = (1..=101).map(|v| ("e", v as f64, true)).collect();
    let s = aggregate(&samples, MedianMethod::Exact).summarize("e");
    assert_eq!(s.p95_latency_ms, 96.0);
}

#[test]
fn test_summarize_all_combines_endpoints() {
    let agg = aggregate(
        &[("a", 10.0, true), ("a", 20.0, false), ("b", 30.0, true), ("b", 40.0, true)],
        MedianMethod::Exact,
    );
    let all = agg.summarize_all();
    assert_eq!(all.endpoint_id, "all");
    assert_eq!(all.request_count, 4);
    assert_eq!(all.failures, 1);
    assert_eq!(all.avg_latency_ms, 25.0);
    assert_eq!(all.error_rate, 0.25);
}

// --- percentile helpers ---

#[test]
fn test_percentile_helpers_empty_return_zero() {
    assert_eq!(percentile(&[], 0.5), 0.0);
    assert_eq!(nearest_rank(&[], 0.5), 0.0);
}

#[test]
fn test_percentile_interpolates() {
    let sorted = [100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0];
    // rank 0.5 * 9 = 4.5 → between 500 and 600
    assert_eq!(percentile(&sorted, 0.5), 550.0);
    assert_eq!(percentile(&sorted, 0.0), 100.0);
    assert_eq!(percentile(&sorted, 1.0), 1000.0);
    // nearest rank: index floor(0.5 * 10) = 5 → 600
    assert_eq!(nearest_rank(&sorted, 0.5), 600.0);
    assert_eq!(nearest_rank(&sorted, 0.99), 1000.0);
}
