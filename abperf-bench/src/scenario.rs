use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::duration_str;

/// Ramp linearly from the previous stage's target to `target` over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampStage {
    #[serde(with = "duration_str")]
    pub duration: Duration,
    pub target: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioStats {
    /// Completed iterations across all workers.
    pub iterations: u64,
    /// Highest number of workers started.
    pub peak_workers: usize,
}

/// Executes a ramp profile, calling `iteration` once per active worker per loop.
pub trait ScenarioRunner: Send + Sync {
    fn run_scenario<F, Fut>(
        &self,
        name: &str,
        stages: &[RampStage],
        iteration: F,
    ) -> impl Future<Output = ScenarioStats> + Send
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static;
}

/// Tokio-based ramping worker pool.
///
/// A controller publishes the current target every `tick`. Worker `i` loops
/// while the target is above `i` and parks otherwise; a worker over the target
/// finishes its current iteration first. Returns once every worker has exited.
#[derive(Debug, Clone, Copy)]
pub struct RampingRunner {
    pub pacing: Duration,
    pub tick: Duration,
}

impl RampingRunner {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing, tick: Duration::from_millis(100) }
    }
}

impl ScenarioRunner for RampingRunner {
    async fn run_scenario<F, Fut>(
        &self,
        name: &str,
        stages: &[RampStage],
        iteration: F,
    ) -> ScenarioStats
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let iteration = Arc::new(iteration);
        let iterations = Arc::new(AtomicU64::new(0));
        let (target_tx, _) = watch::channel(0usize);
        let mut workers = Vec::new();

        let total = total_duration(stages);
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        let mut current_stage = None;

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            let stage = stage_index(stages, elapsed);
            if stage != current_stage {
                if let Some(idx) = stage {
                    info!(
                        scenario = name,
                        stage = idx + 1,
                        workers = stages[idx].target,
                        "ramp stage started"
                    );
                }
                current_stage = stage;
            }

            let target = target_at(stages, elapsed);
            while workers.len() < target {
                workers.push(tokio::spawn(worker_loop(
                    workers.len(),
                    target_tx.subscribe(),
                    Arc::clone(&iteration),
                    self.pacing,
                    Arc::clone(&iterations),
                )));
            }
            target_tx.send_replace(target);
        }

        // Park everyone, then close the channel so parked workers exit.
        target_tx.send_replace(0);
        drop(target_tx);

        let peak_workers = workers.len();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(scenario = name, error = %e, "worker task failed");
            }
        }

        let stats = ScenarioStats { iterations: iterations.load(Ordering::Relaxed), peak_workers };
        info!(scenario = name, iterations = stats.iterations, peak_workers, "scenario finished");
        stats
    }
}

async fn worker_loop<F, Fut>(
    index: usize,
    mut target_rx: watch::Receiver<usize>,
    iteration: Arc<F>,
    pacing: Duration,
    iterations: Arc<AtomicU64>,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let active = *target_rx.borrow_and_update() > index;
        if active {
            iteration().await;
            iterations.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(pacing).await;
        } else if target_rx.changed().await.is_err() {
            break;
        }
    }
}

pub fn total_duration(stages: &[RampStage]) -> Duration {
    stages.iter().map(|s| s.duration).sum()
}

/// Index of the stage running at `elapsed`, or `None` once all stages are over.
pub fn stage_index(stages: &[RampStage], elapsed: Duration) -> Option<usize> {
    let mut stage_end = Duration::ZERO;
    stages.iter().position(|stage| {
        stage_end += stage.duration;
        elapsed < stage_end
    })
}

/// Number of workers that should be active `elapsed` into the profile.
pub fn target_at(stages: &[RampStage], elapsed: Duration) -> usize {
    let mut from = 0usize;
    let mut stage_start = Duration::ZERO;
    for stage in stages {
        let stage_end = stage_start + stage.duration;
        if elapsed < stage_end {
            let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            let value = from as f64 + (stage.target as f64 - from as f64) * progress;
            return value.round() as usize;
        }
        from = stage.target;
        stage_start = stage_end;
    }
    from
}
