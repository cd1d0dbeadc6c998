//! Parallel execution of jobs over a fixed pool of workers.

use std::sync::Arc;
use std::time::Instant;

use alignbench_types::{Job, JobError, JobResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::process::{JobRunner, WorkerSlot};

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Requested number of parallel jobs.
    pub num_jobs: usize,
    /// Pin worker `i`'s backend to core `i + 1`.
    pub pin_cores: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            num_jobs: 1,
            pin_cores: false,
        }
    }
}

/// Number of workers to start: `requested`, capped at one less than the
/// number of cores and at least one. Core 0 is left to the orchestrator.
pub fn effective_workers(requested: usize, cores: usize) -> usize {
    let cap = cores.saturating_sub(1).max(1);
    requested.clamp(1, cap)
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub done: usize,
    pub success: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub interrupted: usize,
}

impl Counts {
    fn record(&mut self, result: &JobResult) {
        self.done += 1;
        match result.error() {
            None => self.success += 1,
            Some(JobError::Unsupported) => self.unsupported += 1,
            Some(JobError::Interrupted) => self.interrupted += 1,
            Some(_) => self.failed += 1,
        }
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Results in job order. Interrupted jobs and jobs that failed after a
    /// cancel are left out.
    pub results: Vec<JobResult>,
    pub counts: Counts,
}

struct Shared {
    queue: Mutex<std::iter::Enumerate<std::vec::IntoIter<Job>>>,
    results: Mutex<Vec<(usize, JobResult)>>,
    counts: Mutex<Counts>,
    total: usize,
}

/// Runs jobs in parallel through a [`JobRunner`].
pub struct Orchestrator {
    runner: Arc<dyn JobRunner>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn JobRunner>, config: OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    /// Run all jobs. Setting `cancel` to `true` stops handing out jobs and
    /// abandons the running ones.
    pub async fn run(&self, jobs: Vec<Job>, cancel: watch::Receiver<bool>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let total = jobs.len();
        let cores = available_cores();
        let workers = effective_workers(self.config.num_jobs, cores).min(total.max(1));
        info!(run_id = %run_id, jobs = total, workers, cores, "Starting run");

        let shared = Arc::new(Shared {
            queue: Mutex::new(jobs.into_iter().enumerate()),
            results: Mutex::new(Vec::with_capacity(total)),
            counts: Mutex::new(Counts::default()),
            total,
        });

        let handles = (0..workers).map(|index| {
            let slot = WorkerSlot {
                index,
                core: self.config.pin_cores.then_some(index + 1),
            };
            self.worker(slot, Arc::clone(&shared), cancel.clone())
        });
        futures::future::join_all(handles).await;

        let counts = *shared.counts.lock().await;
        let mut results = std::mem::take(&mut *shared.results.lock().await);
        results.sort_by_key(|(i, _)| *i);
        let results: Vec<JobResult> = results
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.error() != Some(&JobError::Interrupted))
            .collect();

        if counts.interrupted > 0 || counts.done < total {
            warn!(
                run_id = %run_id,
                interrupted = counts.interrupted,
                skipped = total - counts.done,
                "Run was interrupted"
            );
        }
        info!(
            run_id = %run_id,
            success = counts.success,
            unsupported = counts.unsupported,
            failed = counts.failed,
            "Run finished"
        );

        RunReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
            counts,
        }
    }

    async fn worker(&self, slot: WorkerSlot, shared: Arc<Shared>, cancel: watch::Receiver<bool>) {
        loop {
            if *cancel.borrow() {
                break;
            }
            let Some((i, job)) = shared.queue.lock().await.next() else {
                break;
            };

            let mut result = self.runner.run(job, slot, cancel.clone()).await;
            // After a cancel any failure may stem from the abort itself.
            if *cancel.borrow() {
                if let Err(err) = &result.output {
                    if *err != JobError::Interrupted {
                        debug!(job = %result.job.short_id(), error = %err, "Discarding failure after cancel");
                        result.output = Err(JobError::Interrupted);
                    }
                }
            }

            let counts = {
                let mut counts = shared.counts.lock().await;
                counts.record(&result);
                *counts
            };
            info!(
                done = counts.done,
                total = shared.total,
                success = counts.success,
                unsupported = counts.unsupported,
                failed = counts.failed,
                worker = slot.index,
                "Progress"
            );
            shared.results.lock().await.push((i, result));
        }
    }
}
