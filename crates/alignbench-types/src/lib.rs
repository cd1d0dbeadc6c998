//! alignbench types - suite configuration schema and job model.
//!
//! Provides:
//! - The YAML suite schema (`Suite`, `DatasetRef`, `CostModel`, `AlgoSpec`)
//! - Unit parsing for memory sizes and durations
//! - Validation with field-path error reporting
//! - The job model exchanged with aligner backends

pub mod algo;
pub mod config;
pub mod cost;
pub mod error;
pub mod job;
pub mod load;
pub mod units;
pub mod validate;

// Re-export key types
pub use algo::{
    AlgoSpec, AstarPa2Params, BlockAlignerParams, BlockSize, Domain, DoublingStart, DoublingType,
    FrontParams, HeuristicParams, HeuristicType, Prune, WfaHeuristic, WfaMemoryModel, WfaParams,
    ALGO_TAGS,
};
pub use config::{DatasetRef, Suite};
pub use cost::CostModel;
pub use error::{ConfigError, UnitError, Violation};
pub use job::{
    Cost, Dataset, Job, JobError, JobOutput, JobResult, Measured, ResourceUsage, SeqStats,
};
pub use load::{load_suites, parse_suites, to_yaml};
pub use units::{format_duration, parse_duration, ByteSize};
pub use validate::validate_suites;
