//! alignbench runner - turns suites into jobs and runs them against a backend.
//!
//! Provides:
//! - Dataset download, extraction and caching
//! - Expansion of suites into jobs
//! - Aligner adapters mapping job parameters onto backend flags
//! - Resource-limited backend processes and a parallel worker pool
//! - Result storage and cost verification

pub mod adapter;
pub mod dataset;
pub mod error;
pub mod expand;
pub mod orchestrator;
pub mod process;
pub mod results;
pub mod telemetry;
pub mod verify;

// Re-export key types
pub use adapter::{adapter_for, resolve_block_size, AlignerAdapter};
pub use dataset::{extract_zip, find_seq_files, seq_stats, DatasetFetcher, FetchConfig, SeqStats};
pub use error::{FetchError, StoreError};
pub use expand::{expand_all, expand_suite, Expansion, Overrides, SuiteFailure};
pub use orchestrator::{effective_workers, Counts, Orchestrator, OrchestratorConfig, RunReport};
pub use process::{classify_failure, JobRunner, ProcessConfig, ProcessRunner, WorkerSlot};
pub use results::{
    default_results_path, load_results, merge_results, retain_pending, save_results, write_log,
};
pub use telemetry::init_tracing;
pub use verify::{verify_costs, CostMismatch, VerifyReport};
