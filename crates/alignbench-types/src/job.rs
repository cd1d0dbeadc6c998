//! Alignment jobs and their results.
//!
//! A [`Job`] is a single aligner invocation: one dataset, one cost model, one
//! trace setting and one aligner, bounded by the suite's limits. Jobs are
//! sent to backends as JSON and backends answer with a [`JobOutput`].

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::algo::AlgoSpec;
use crate::cost::CostModel;
use crate::units::{self, ByteSize};

/// Alignment cost as reported by a backend.
pub type Cost = i64;

/// A concrete dataset, after downloads have been resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Dataset {
    /// Path to a `.seq` file.
    File(PathBuf),
    /// The data itself. Only use this for small inputs.
    Data(Vec<(String, String)>),
}

impl Dataset {
    pub fn describe(&self) -> String {
        match self {
            Dataset::File(path) => path.display().to_string(),
            Dataset::Data(pairs) => format!("{} inline pair(s)", pairs.len()),
        }
    }
}

/// A single task for a backend to execute and benchmark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Maximum CPU time, enforced with `RLIMIT_CPU`.
    #[serde(with = "units::duration")]
    pub time_limit: Duration,
    /// Maximum data segment size, enforced with `RLIMIT_DATA`. Includes
    /// the backend's startup overhead.
    pub mem_limit: ByteSize,
    pub dataset: Dataset,
    pub costs: CostModel,
    /// Return the full alignment instead of only the cost.
    pub traceback: bool,
    pub algo: AlgoSpec,
}

impl Job {
    /// Whether the jobs are the same, ignoring resources.
    pub fn is_same_as(&self, o: &Self) -> bool {
        self.dataset == o.dataset
            && self.costs == o.costs
            && self.traceback == o.traceback
            && self.algo == o.algo
    }

    /// Whether this job had at least the resources of another job.
    pub fn has_more_resources_than(&self, o: &Self) -> bool {
        self.time_limit >= o.time_limit && self.mem_limit >= o.mem_limit
    }

    /// Whether both jobs align the same pairs under the same costs, so their
    /// exact costs must agree.
    pub fn same_input(&self, o: &Self) -> bool {
        self.dataset == o.dataset && self.costs == o.costs
    }

    /// Stable SHA-256 identifier of the job, including its resources.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain data into a Vec cannot fail.
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hex::encode(hasher.finalize())
    }

    /// First 12 hex characters of [`Job::digest`], for logs.
    pub fn short_id(&self) -> String {
        self.digest()[..12].to_string()
    }
}

/// Measurements reported by the backend itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measured {
    /// Alignment runtime in seconds, excluding startup.
    pub runtime: f64,
    /// Peak memory used by the alignment, excluding startup.
    pub memory: ByteSize,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    /// CPU core running the process at start and end.
    #[serde(default)]
    pub cpu_start: Option<i32>,
    #[serde(default)]
    pub cpu_end: Option<i32>,
}

/// The output of a successful alignment job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutput {
    /// One cost per sequence pair, in input order.
    pub costs: Vec<Cost>,
    /// Exact costs for comparison when the aligner is approximate. Filled in
    /// by cost verification.
    #[serde(default)]
    pub exact_costs: Option<Vec<Cost>>,
    pub is_exact: bool,
    /// Fraction of correct costs. Filled in by cost verification.
    #[serde(default)]
    pub p_correct: Option<f64>,
    pub measured: Measured,
}

/// Why a job produced no output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The aligner cannot run this combination of parameters.
    #[error("unsupported parameter combination")]
    Unsupported,
    /// Interrupted by the user (SIGINT).
    #[error("interrupted")]
    Interrupted,
    /// The backend panicked (exit code 101).
    #[error("backend panicked")]
    Panic,
    /// CPU or wall-clock time ran out (SIGXCPU or SIGKILL).
    #[error("time limit exceeded")]
    Timeout,
    /// Allocation failed under the memory limit (SIGABRT).
    #[error("memory limit exceeded")]
    MemoryLimit,
    #[error("killed by signal {0}")]
    Signal(i32),
    #[error("exited with code {0}")]
    ExitCode(i32),
    #[error("failed to start backend: {0}")]
    Spawn(String),
    #[error("malformed backend output: {0}")]
    BadOutput(String),
}

/// Size statistics of a dataset, used to scale relative aligner parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqStats {
    /// Number of sequence pairs.
    pub pairs: usize,
    /// Total length of all sequences.
    pub total_len: usize,
    /// Length of the longest sequence.
    pub max_len: usize,
}

impl SeqStats {
    pub fn add_pair(&mut self, a: usize, b: usize) {
        self.pairs += 1;
        self.total_len += a + b;
        self.max_len = self.max_len.max(a).max(b);
    }

    /// Statistics of inline sequence pairs.
    pub fn of_pairs(pairs: &[(String, String)]) -> Self {
        let mut stats = SeqStats::default();
        for (a, b) in pairs {
            stats.add_pair(a.len(), b.len());
        }
        stats
    }
}

/// Resources used by a job, measured by the harness from the backend's
/// rusage after it exits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceUsage {
    /// Wall-clock seconds from spawn to exit.
    pub walltime: f64,
    /// CPU seconds spent in user mode.
    #[serde(default)]
    pub usertime: f64,
    /// CPU seconds spent in the kernel.
    #[serde(default)]
    pub systemtime: f64,
    /// Peak resident set size, including startup.
    #[serde(default)]
    pub maxrss: ByteSize,
}

/// The result of an alignment job, containing the input and output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub job: Job,
    /// Statistics of the job's dataset. Empty for jobs that never started.
    #[serde(default)]
    pub stats: SeqStats,
    #[serde(default)]
    pub resources: ResourceUsage,
    pub output: Result<JobOutput, JobError>,
}

impl JobResult {
    pub fn is_ok(&self) -> bool {
        self.output.is_ok()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.output.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job {
            time_limit: Duration::from_secs(60),
            mem_limit: ByteSize::gib(1),
            dataset: Dataset::File(PathBuf::from("data/a.seq")),
            costs: CostModel::UNIT,
            traceback: false,
            algo: AlgoSpec::Edlib,
        }
    }

    #[test]
    fn test_same_job_ignores_resources() {
        let a = job();
        let mut b = job();
        b.time_limit = Duration::from_secs(600);
        assert!(a.is_same_as(&b));
        assert!(b.has_more_resources_than(&a));
        assert!(!a.has_more_resources_than(&b));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_same_input_ignores_algo_and_trace() {
        let a = job();
        let mut b = job();
        b.traceback = true;
        b.algo = AlgoSpec::Wfa(Default::default());
        assert!(a.same_input(&b));
        assert!(!a.is_same_as(&b));

        b.costs.sub = 2;
        assert!(!a.same_input(&b));
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(job().digest(), job().digest());
        assert_eq!(job().digest().len(), 64);
        assert_eq!(job().short_id().len(), 12);
    }

    #[test]
    fn test_job_json_uses_readable_units() {
        let json = serde_json::to_value(job()).unwrap();
        assert_eq!(json["time_limit"], "1m");
        assert_eq!(json["mem_limit"], "1GiB");
        assert_eq!(json["algo"], "Edlib");
    }

    #[test]
    fn test_result_error_serialization() {
        let result = JobResult {
            job: job(),
            stats: SeqStats::of_pairs(&[("ACGT".into(), "AC".into())]),
            resources: ResourceUsage {
                walltime: 1.5,
                usertime: 1.2,
                systemtime: 0.1,
                maxrss: ByteSize::mib(3),
            },
            output: Err(JobError::Signal(11)),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""Err":{"Signal":11}"#));
        let back: JobResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.error(), Some(&JobError::Signal(11)));
    }

    #[test]
    fn test_results_without_harness_measurements_still_load() {
        let json = format!(
            r#"{{"job":{},"resources":{{"walltime":2.0}},"output":{{"Err":"Timeout"}}}}"#,
            serde_json::to_string(&job()).unwrap()
        );
        let result: JobResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.stats, SeqStats::default());
        assert_eq!(result.resources.walltime, 2.0);
        assert_eq!(result.resources.maxrss, ByteSize(0));
    }

    #[test]
    fn test_seq_stats_of_pairs() {
        let stats = SeqStats::of_pairs(&[
            ("ACGT".to_string(), "AC".to_string()),
            ("A".to_string(), "ACGTTT".to_string()),
        ]);
        assert_eq!(
            stats,
            SeqStats {
                pairs: 2,
                total_len: 13,
                max_len: 6
            }
        );
    }
}
