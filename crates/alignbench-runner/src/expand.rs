//! Expansion of suites into jobs.

use std::time::Duration;

use alignbench_types::{ByteSize, Dataset, Job, Suite};
use tracing::{error, info};

use crate::dataset::DatasetFetcher;
use crate::error::FetchError;

/// Resource limits that replace every suite's own values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub time_limit: Option<Duration>,
    pub mem_limit: Option<ByteSize>,
}

/// Expand one suite over already-resolved datasets.
///
/// Jobs are emitted for every dataset × trace × cost × algo, nested in that
/// order.
pub fn expand_suite(suite: &Suite, datasets: &[Dataset], overrides: &Overrides) -> Vec<Job> {
    let time_limit = overrides.time_limit.unwrap_or(suite.time_limit);
    let mem_limit = overrides.mem_limit.unwrap_or(suite.mem_limit);

    let mut jobs = Vec::with_capacity(datasets.len() * suite.configurations_per_dataset());
    for dataset in datasets {
        for &traceback in &suite.traces {
            for &costs in &suite.costs {
                for algo in &suite.algos {
                    jobs.push(Job {
                        time_limit,
                        mem_limit,
                        dataset: dataset.clone(),
                        costs,
                        traceback,
                        algo: algo.clone(),
                    });
                }
            }
        }
    }
    jobs
}

/// A suite whose datasets could not be fetched.
#[derive(Debug)]
pub struct SuiteFailure {
    /// Position of the suite in the experiment file.
    pub suite: usize,
    pub error: FetchError,
}

/// Jobs of all suites that could be fetched, plus the suites that could not.
#[derive(Debug, Default)]
pub struct Expansion {
    pub jobs: Vec<Job>,
    pub failed: Vec<SuiteFailure>,
}

/// Fetch every suite's datasets and expand the suites into jobs.
///
/// A fetch failure drops the whole suite and is reported in
/// [`Expansion::failed`]. Other suites are unaffected.
pub async fn expand_all(
    suites: &[Suite],
    fetcher: &DatasetFetcher,
    overrides: &Overrides,
) -> Expansion {
    let mut expansion = Expansion::default();

    'suites: for (i, suite) in suites.iter().enumerate() {
        let mut datasets = Vec::new();
        for dataset in &suite.datasets {
            match fetcher.fetch(dataset).await {
                Ok(resolved) => datasets.extend(resolved),
                Err(err) => {
                    error!(suite = i, dataset = %dataset.describe(), error = %err, "Skipping suite: dataset unavailable");
                    expansion.failed.push(SuiteFailure { suite: i, error: err });
                    continue 'suites;
                }
            }
        }

        let jobs = expand_suite(suite, &datasets, overrides);
        info!(suite = i, datasets = datasets.len(), jobs = jobs.len(), "Expanded suite");
        expansion.jobs.extend(jobs);
    }

    expansion
}
