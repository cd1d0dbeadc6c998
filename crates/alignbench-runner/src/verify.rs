//! Cross-checking of reported costs.
//!
//! Exact aligners must agree on every pair's cost for the same input. The
//! first exact result for an input serves as the reference; approximate
//! results are scored against it.

use alignbench_types::{Cost, JobResult};
use serde::Serialize;
use tracing::{info, warn};

/// Two exact aligners disagreeing on the same input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostMismatch {
    /// Index of the reference result.
    pub reference: usize,
    /// Index of the disagreeing result.
    pub result: usize,
    pub reference_algo: String,
    pub algo: String,
    pub dataset: String,
    /// Number of pairs whose costs differ. Differing pair counts count as
    /// all pairs.
    pub differing_pairs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    pub mismatches: Vec<CostMismatch>,
    /// Approximate results that were scored against a reference.
    pub approximate_checked: usize,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn exact_costs(result: &JobResult) -> Option<&[Cost]> {
    match &result.output {
        Ok(out) if out.is_exact => Some(&out.costs),
        _ => None,
    }
}

fn differing(a: &[Cost], b: &[Cost]) -> usize {
    if a.len() != b.len() {
        return a.len().max(b.len());
    }
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Check exact results against each other and fill `exact_costs` and
/// `p_correct` of approximate results.
pub fn verify_costs(results: &mut [JobResult]) -> VerifyReport {
    let mut report = VerifyReport::default();

    let references: Vec<Option<usize>> = (0..results.len())
        .map(|i| {
            (0..results.len()).find(|&j| {
                exact_costs(&results[j]).is_some() && results[j].job.same_input(&results[i].job)
            })
        })
        .collect();

    for (i, reference) in references.into_iter().enumerate() {
        let Some(r) = reference else { continue };
        if r == i {
            continue;
        }
        let Some(expected) = exact_costs(&results[r]).map(<[Cost]>::to_vec) else {
            continue;
        };
        let reference_algo = results[r].job.algo.name().to_string();

        let result = &mut results[i];
        let Ok(output) = &mut result.output else {
            continue;
        };

        if output.is_exact {
            let differing_pairs = differing(&expected, &output.costs);
            if differing_pairs > 0 {
                let mismatch = CostMismatch {
                    reference: r,
                    result: i,
                    reference_algo,
                    algo: result.job.algo.name().to_string(),
                    dataset: result.job.dataset.describe(),
                    differing_pairs,
                };
                warn!(
                    algo = %mismatch.algo,
                    reference = %mismatch.reference_algo,
                    dataset = %mismatch.dataset,
                    differing_pairs,
                    "Exact aligners disagree on costs"
                );
                report.mismatches.push(mismatch);
            }
        } else {
            let total = output.costs.len().max(expected.len());
            let correct = total - differing(&expected, &output.costs);
            output.p_correct = Some(if total == 0 {
                1.0
            } else {
                correct as f64 / total as f64
            });
            output.exact_costs = Some(expected);
            report.approximate_checked += 1;
        }
    }

    info!(
        mismatches = report.mismatches.len(),
        approximate = report.approximate_checked,
        "Verified costs"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use alignbench_types::{
        AlgoSpec, BlockAlignerParams, BlockSize, ByteSize, CostModel, Dataset, Job, JobError,
        JobOutput, Measured, ResourceUsage, WfaParams,
    };
    use chrono::Utc;
    use std::time::Duration;

    fn result(algo: AlgoSpec, costs: Vec<Cost>, is_exact: bool) -> JobResult {
        JobResult {
            job: Job {
                time_limit: Duration::from_secs(1),
                mem_limit: ByteSize::gib(1),
                dataset: Dataset::File("a.seq".into()),
                costs: CostModel::UNIT,
                traceback: false,
                algo,
            },
            stats: Default::default(),
            resources: ResourceUsage::default(),
            output: Ok(JobOutput {
                costs,
                exact_costs: None,
                is_exact,
                p_correct: None,
                measured: Measured {
                    runtime: 0.0,
                    memory: ByteSize(0),
                    time_start: Utc::now(),
                    time_end: Utc::now(),
                    cpu_start: None,
                    cpu_end: None,
                },
            }),
        }
    }

    fn block_aligner() -> AlgoSpec {
        AlgoSpec::BlockAligner(BlockAlignerParams {
            size: BlockSize::Size(32, 64),
        })
    }

    #[test]
    fn test_agreeing_exact_results() {
        let mut results = vec![
            result(AlgoSpec::Edlib, vec![1, 2, 3], true),
            result(AlgoSpec::Wfa(WfaParams::default()), vec![1, 2, 3], true),
        ];
        let report = verify_costs(&mut results);
        assert!(report.is_consistent());
        assert_eq!(report.approximate_checked, 0);
    }

    #[test]
    fn test_disagreement_is_reported() {
        let mut results = vec![
            result(AlgoSpec::Edlib, vec![1, 2, 3], true),
            result(AlgoSpec::Wfa(WfaParams::default()), vec![1, 5, 4], true),
        ];
        let report = verify_costs(&mut results);
        assert_eq!(
            report.mismatches,
            vec![CostMismatch {
                reference: 0,
                result: 1,
                reference_algo: "edlib".to_string(),
                algo: "wfa".to_string(),
                dataset: "a.seq".to_string(),
                differing_pairs: 2,
            }]
        );
    }

    #[test]
    fn test_approximate_results_are_scored() {
        let mut results = vec![
            result(block_aligner(), vec![1, 3, 3, 5], false),
            result(AlgoSpec::Edlib, vec![1, 2, 3, 4], true),
        ];
        let report = verify_costs(&mut results);
        assert!(report.is_consistent());
        assert_eq!(report.approximate_checked, 1);

        let output = results[0].output.as_ref().unwrap();
        assert_eq!(output.exact_costs, Some(vec![1, 2, 3, 4]));
        assert_eq!(output.p_correct, Some(0.5));
    }

    #[test]
    fn test_different_inputs_are_not_compared() {
        let mut other = result(AlgoSpec::Edlib, vec![9], true);
        other.job.costs = CostModel {
            sub: 4,
            open: 6,
            extend: 2,
        };
        let mut results = vec![result(AlgoSpec::Edlib, vec![1], true), other];
        assert!(verify_costs(&mut results).is_consistent());
    }

    #[test]
    fn test_failed_results_are_ignored() {
        let mut failed = result(AlgoSpec::Edlib, vec![], true);
        failed.output = Err(JobError::Timeout);
        let mut results = vec![failed, result(block_aligner(), vec![1], false)];
        let report = verify_costs(&mut results);
        assert_eq!(report.approximate_checked, 0);
        assert_eq!(results[1].output.as_ref().unwrap().p_correct, None);
    }
}
