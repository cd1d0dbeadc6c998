//! Aligner adapters.
//!
//! An adapter knows which jobs its aligner can run and how the job's
//! parameters map onto the backend's native command-line flags.

use alignbench_types::{
    AlgoSpec, AstarPa2Params, BlockSize, CostModel, DoublingType, Job, WfaHeuristic,
    WfaMemoryModel,
};

use crate::dataset::SeqStats;

/// Smallest block size handed to the block aligner.
pub const MIN_BLOCK_SIZE: usize = 32;

/// Per-aligner parameter checks and flag mapping.
pub trait AlignerAdapter: Send + Sync {
    /// Backend subcommand name.
    fn name(&self) -> &'static str;

    /// `Err(reason)` when the aligner cannot run this job.
    fn check(&self, job: &Job) -> Result<(), String>;

    /// Native flags for the job, in `--key=value` form.
    fn native_args(&self, job: &Job, stats: &SeqStats) -> Vec<String>;
}

/// The adapter handling an aligner.
pub fn adapter_for(algo: &AlgoSpec) -> &'static dyn AlignerAdapter {
    match algo {
        AlgoSpec::Edlib => &EdlibAdapter,
        AlgoSpec::Wfa(_) => &WfaAdapter,
        AlgoSpec::AstarPa2(_) => &AstarPa2Adapter,
        AlgoSpec::BlockAligner(_) => &BlockAlignerAdapter,
    }
}

fn require_unit_costs(costs: &CostModel) -> Result<(), String> {
    if costs.is_unit() {
        Ok(())
    } else {
        Err(format!(
            "only unit costs are supported, got sub={} open={} extend={}",
            costs.sub, costs.open, costs.extend
        ))
    }
}

fn flag(key: &str, value: impl std::fmt::Display) -> String {
    format!("--{key}={value}")
}

pub struct EdlibAdapter;

impl AlignerAdapter for EdlibAdapter {
    fn name(&self) -> &'static str {
        "edlib"
    }

    fn check(&self, job: &Job) -> Result<(), String> {
        require_unit_costs(&job.costs)
    }

    fn native_args(&self, job: &Job, _stats: &SeqStats) -> Vec<String> {
        let task = if job.traceback { "path" } else { "distance" };
        vec![flag("task", task)]
    }
}

pub struct WfaAdapter;

impl WfaAdapter {
    fn memory_mode(model: WfaMemoryModel) -> &'static str {
        match model {
            WfaMemoryModel::MemoryHigh => "high",
            WfaMemoryModel::MemoryMed => "med",
            WfaMemoryModel::MemoryLow => "low",
            WfaMemoryModel::MemoryUltraLow => "ultralow",
        }
    }

    fn heuristic_args(heuristic: &WfaHeuristic) -> Vec<String> {
        match *heuristic {
            WfaHeuristic::None => vec![flag("heuristic", "none")],
            WfaHeuristic::BandedStatic {
                band_min_k,
                band_max_k,
            } => vec![
                flag("heuristic", "banded-static"),
                flag("band-min-k", band_min_k),
                flag("band-max-k", band_max_k),
            ],
            WfaHeuristic::BandedAdaptive {
                band_min_k,
                band_max_k,
                steps_between_cutoffs,
            } => vec![
                flag("heuristic", "banded-adaptive"),
                flag("band-min-k", band_min_k),
                flag("band-max-k", band_max_k),
                flag("steps-between-cutoffs", steps_between_cutoffs),
            ],
            WfaHeuristic::WFAdaptive {
                min_wavefront_length,
                max_distance_threshold,
                steps_between_cutoffs,
            } => vec![
                flag("heuristic", "wfa-adaptive"),
                flag("min-wavefront-length", min_wavefront_length),
                flag("max-distance-threshold", max_distance_threshold),
                flag("steps-between-cutoffs", steps_between_cutoffs),
            ],
            WfaHeuristic::XDrop {
                x_drop,
                steps_between_cutoffs,
            } => vec![
                flag("heuristic", "xdrop"),
                flag("x-drop", x_drop),
                flag("steps-between-cutoffs", steps_between_cutoffs),
            ],
            WfaHeuristic::ZDrop {
                z_drop,
                steps_between_cutoffs,
            } => vec![
                flag("heuristic", "zdrop"),
                flag("z-drop", z_drop),
                flag("steps-between-cutoffs", steps_between_cutoffs),
            ],
        }
    }
}

impl AlignerAdapter for WfaAdapter {
    fn name(&self) -> &'static str {
        "wfa"
    }

    fn check(&self, _job: &Job) -> Result<(), String> {
        Ok(())
    }

    fn native_args(&self, job: &Job, _stats: &SeqStats) -> Vec<String> {
        let AlgoSpec::Wfa(params) = &job.algo else {
            return Vec::new();
        };
        let costs = &job.costs;

        let mut args = if costs.is_unit() {
            vec![flag("distance", "edit")]
        } else if costs.is_affine() {
            vec![
                flag("distance", "gap-affine"),
                flag("mismatch", costs.sub),
                flag("gap-opening", costs.open),
                flag("gap-extension", costs.extend),
            ]
        } else {
            vec![
                flag("distance", "gap-linear"),
                flag("mismatch", costs.sub),
                flag("indel", costs.extend),
            ]
        };
        args.push(flag("memory-mode", Self::memory_mode(params.memory_model)));
        args.extend(Self::heuristic_args(&params.heuristic));
        if !job.traceback {
            args.push("--score-only".to_string());
        }
        args
    }
}

pub struct AstarPa2Adapter;

impl AstarPa2Adapter {
    fn params_args(params: &AstarPa2Params) -> Vec<String> {
        let mut args = Vec::new();
        if !params.name.is_empty() {
            args.push(flag("name", &params.name));
        }
        args.push(flag("domain", format!("{:?}", params.domain).to_lowercase()));

        let h = &params.heuristic;
        args.push(flag("heuristic", h.kind.as_str()));
        if h.kind.uses_seeds() {
            args.push(flag("k", h.k));
            args.push(flag("r", h.r));
            args.push(flag("p", h.p));
            args.push(flag("heuristic-prune", h.prune.as_str()));
        }

        match &params.doubling {
            DoublingType::None => args.push(flag("doubling", "none")),
            DoublingType::BandDoubling { start, factor } => {
                args.push(flag("doubling", "band"));
                args.push(flag("doubling-start", start.as_str()));
                args.push(flag("doubling-factor", factor));
            }
            DoublingType::LinearSearch { start, delta } => {
                args.push(flag("doubling", "linear"));
                args.push(flag("doubling-start", start.as_str()));
                args.push(flag("doubling-delta", delta));
            }
        }
        args.push(flag("block-width", params.block_width));

        let front = &params.front;
        args.push(flag("sparse", front.sparse));
        args.push(flag("simd", front.simd));
        args.push(flag("incremental-doubling", front.incremental_doubling));
        args.push(flag("dt-trace", front.dt_trace));
        args.push(flag("max-g", front.max_g));
        args.push(flag("fr-drop", front.fr_drop));
        args.push(flag("sparse-h", params.sparse_h));
        args.push(flag("prune", params.prune));
        args
    }
}

impl AlignerAdapter for AstarPa2Adapter {
    fn name(&self) -> &'static str {
        "astarpa2"
    }

    fn check(&self, job: &Job) -> Result<(), String> {
        require_unit_costs(&job.costs)
    }

    fn native_args(&self, job: &Job, _stats: &SeqStats) -> Vec<String> {
        let AlgoSpec::AstarPa2(params) = &job.algo else {
            return Vec::new();
        };
        let mut args = Self::params_args(params);
        if !job.traceback {
            args.push("--cost-only".to_string());
        }
        args
    }
}

pub struct BlockAlignerAdapter;

/// Resolve a block size range to absolute sizes.
///
/// `!Percent` bounds are taken relative to `max_len`, then rounded up to a
/// power of two of at least [`MIN_BLOCK_SIZE`].
pub fn resolve_block_size(size: BlockSize, max_len: usize) -> (usize, usize) {
    match size {
        BlockSize::Size(min, max) => (min, max),
        BlockSize::Percent(lo, hi) => {
            let scale = |p: f64| {
                let raw = (p * max_len as f64).ceil() as usize;
                raw.max(MIN_BLOCK_SIZE).next_power_of_two()
            };
            let min = scale(lo);
            (min, scale(hi).max(min))
        }
    }
}

impl AlignerAdapter for BlockAlignerAdapter {
    fn name(&self) -> &'static str {
        "block_aligner"
    }

    fn check(&self, job: &Job) -> Result<(), String> {
        let costs = &job.costs;
        if costs.is_unit() || costs.open > 0 {
            Ok(())
        } else {
            Err(format!(
                "linear gap costs are not supported, got sub={} extend={}",
                costs.sub, costs.extend
            ))
        }
    }

    fn native_args(&self, job: &Job, stats: &SeqStats) -> Vec<String> {
        let AlgoSpec::BlockAligner(params) = &job.algo else {
            return Vec::new();
        };
        let costs = &job.costs;
        let (min, max) = resolve_block_size(params.size, stats.max_len);

        // Scores are negated costs; the first gap character pays open + extend.
        let mut args = vec![
            flag("mismatch", -(costs.sub as i64)),
            flag("gap-open", -((costs.open + costs.extend) as i64)),
            flag("gap-extend", -(costs.extend as i64)),
            flag("min-size", min),
            flag("max-size", max),
        ];
        if job.traceback {
            args.push("--trace".to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alignbench_types::{
        BlockAlignerParams, ByteSize, Dataset, Domain, DoublingStart, FrontParams,
        HeuristicParams, HeuristicType, Prune, WfaParams,
    };
    use std::path::PathBuf;
    use std::time::Duration;

    fn job(algo: AlgoSpec, costs: CostModel, traceback: bool) -> Job {
        Job {
            time_limit: Duration::from_secs(10),
            mem_limit: ByteSize::gib(1),
            dataset: Dataset::File(PathBuf::from("x.seq")),
            costs,
            traceback,
            algo,
        }
    }

    const AFFINE: CostModel = CostModel {
        sub: 4,
        open: 6,
        extend: 2,
    };

    #[test]
    fn test_adapter_names_match_algo_names() {
        let algos = [
            AlgoSpec::Edlib,
            AlgoSpec::Wfa(WfaParams::default()),
            AlgoSpec::BlockAligner(BlockAlignerParams {
                size: BlockSize::Size(32, 64),
            }),
        ];
        for algo in algos {
            assert_eq!(adapter_for(&algo).name(), algo.name());
        }
    }

    #[test]
    fn test_edlib_requires_unit_costs() {
        let stats = SeqStats::default();
        let unit = job(AlgoSpec::Edlib, CostModel::UNIT, true);
        assert!(EdlibAdapter.check(&unit).is_ok());
        assert_eq!(EdlibAdapter.native_args(&unit, &stats), vec!["--task=path"]);

        let affine = job(AlgoSpec::Edlib, AFFINE, false);
        let reason = EdlibAdapter.check(&affine).unwrap_err();
        assert!(reason.contains("unit costs"));
    }

    #[test]
    fn test_wfa_args() {
        let params = WfaParams {
            memory_model: WfaMemoryModel::MemoryUltraLow,
            heuristic: WfaHeuristic::XDrop {
                x_drop: 50,
                steps_between_cutoffs: 1,
            },
        };
        let j = job(AlgoSpec::Wfa(params), AFFINE, false);
        assert!(WfaAdapter.check(&j).is_ok());
        let args = WfaAdapter.native_args(&j, &SeqStats::default());
        assert_eq!(
            args,
            vec![
                "--distance=gap-affine",
                "--mismatch=4",
                "--gap-opening=6",
                "--gap-extension=2",
                "--memory-mode=ultralow",
                "--heuristic=xdrop",
                "--x-drop=50",
                "--steps-between-cutoffs=1",
                "--score-only",
            ]
        );
    }

    #[test]
    fn test_wfa_linear_costs() {
        let linear = CostModel {
            sub: 2,
            open: 0,
            extend: 3,
        };
        let j = job(AlgoSpec::Wfa(WfaParams::default()), linear, true);
        let args = WfaAdapter.native_args(&j, &SeqStats::default());
        assert_eq!(&args[..3], ["--distance=gap-linear", "--mismatch=2", "--indel=3"]);
        assert!(!args.contains(&"--score-only".to_string()));
    }

    #[test]
    fn test_astarpa2_args() {
        let params = AstarPa2Params {
            name: "full".to_string(),
            domain: Domain::Astar,
            heuristic: HeuristicParams {
                kind: HeuristicType::Gcsh,
                prune: Prune::Both,
                k: 12,
                r: 2,
                p: 14,
            },
            doubling: DoublingType::BandDoubling {
                start: DoublingStart::H0,
                factor: 2.0,
            },
            block_width: 256,
            front: FrontParams::default(),
            sparse_h: true,
            prune: true,
        };
        let j = job(AlgoSpec::AstarPa2(params), CostModel::UNIT, false);
        assert_eq!(adapter_for(&j.algo).name(), "astarpa2");
        assert!(AstarPa2Adapter.check(&j).is_ok());

        let args = AstarPa2Adapter.native_args(&j, &SeqStats::default());
        for expected in [
            "--name=full",
            "--domain=astar",
            "--heuristic=gcsh",
            "--k=12",
            "--r=2",
            "--p=14",
            "--heuristic-prune=both",
            "--doubling=band",
            "--doubling-start=h0",
            "--doubling-factor=2",
            "--block-width=256",
            "--max-g=40",
            "--sparse-h=true",
            "--cost-only",
        ] {
            assert!(args.contains(&expected.to_string()), "missing {expected} in {args:?}");
        }

        let affine = job(j.algo.clone(), AFFINE, false);
        assert!(AstarPa2Adapter.check(&affine).is_err());
    }

    #[test]
    fn test_resolve_percent_block_size() {
        // 1% and 10% of 10_000 are 100 and 1000, rounded up to powers of two.
        assert_eq!(
            resolve_block_size(BlockSize::Percent(0.01, 0.1), 10_000),
            (128, 1024)
        );
        // Tiny inputs clamp to the minimum.
        assert_eq!(resolve_block_size(BlockSize::Percent(0.01, 0.1), 50), (32, 32));
        assert_eq!(resolve_block_size(BlockSize::Size(40, 400), 10), (40, 400));
    }

    #[test]
    fn test_block_aligner_args_and_check() {
        let params = BlockAlignerParams {
            size: BlockSize::Percent(0.01, 0.1),
        };
        let stats = SeqStats {
            pairs: 1,
            total_len: 20_000,
            max_len: 10_000,
        };
        let j = job(AlgoSpec::BlockAligner(params.clone()), AFFINE, true);
        assert!(BlockAlignerAdapter.check(&j).is_ok());
        assert_eq!(
            BlockAlignerAdapter.native_args(&j, &stats),
            vec![
                "--mismatch=-4",
                "--gap-open=-8",
                "--gap-extend=-2",
                "--min-size=128",
                "--max-size=1024",
                "--trace",
            ]
        );

        let linear = CostModel {
            sub: 1,
            open: 0,
            extend: 2,
        };
        let j = job(AlgoSpec::BlockAligner(params), linear, false);
        assert!(BlockAlignerAdapter.check(&j).is_err());
    }
}
