//! Semantic validation of parsed suites.
//!
//! Parsing already rejects unknown tags, unknown fields and missing fields.
//! Validation covers the remaining value-level rules and reports every
//! violation at once, each located by its field path.

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::algo::{AlgoSpec, AstarPa2Params, BlockSize, DoublingType, WfaHeuristic};
use crate::config::{DatasetRef, Suite};
use crate::cost::CostModel;
use crate::error::{ConfigError, Result, Violation};

/// Validate all suites, failing with every violation found.
pub fn validate_suites(suites: &[Suite]) -> Result<()> {
    if suites.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut violations = Vec::new();
    for (i, suite) in suites.iter().enumerate() {
        check_suite(&format!("suite[{i}]"), suite, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(violations))
    }
}

fn check_suite(path: &str, suite: &Suite, out: &mut Vec<Violation>) {
    if suite.time_limit.is_zero() {
        out.push(Violation::new(format!("{path}.time_limit"), "must be positive"));
    }
    if suite.mem_limit.is_zero() {
        out.push(Violation::new(format!("{path}.mem_limit"), "must be positive"));
    }

    for (field, empty) in [
        ("datasets", suite.datasets.is_empty()),
        ("traces", suite.traces.is_empty()),
        ("costs", suite.costs.is_empty()),
        ("algos", suite.algos.is_empty()),
    ] {
        if empty {
            out.push(Violation::new(format!("{path}.{field}"), "must not be empty"));
        }
    }

    let mut dirs = HashSet::new();
    for (i, dataset) in suite.datasets.iter().enumerate() {
        let path = format!("{path}.datasets[{i}]");
        check_dataset(&path, dataset, out);
        if let DatasetRef::Download { dir, .. } = dataset {
            if !dirs.insert(dir.clone()) {
                out.push(Violation::new(
                    format!("{path}.dir"),
                    format!("directory {} is used by another dataset of this suite", dir.display()),
                ));
            }
        }
    }

    for (i, costs) in suite.costs.iter().enumerate() {
        check_costs(&format!("{path}.costs[{i}]"), costs, out);
    }

    for (i, algo) in suite.algos.iter().enumerate() {
        check_algo(&format!("{path}.algos[{i}]"), algo, out);
    }
}

fn check_dataset(path: &str, dataset: &DatasetRef, out: &mut Vec<Violation>) {
    match dataset {
        DatasetRef::Download { url, dir } => {
            match url::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
                Ok(parsed) => out.push(Violation::new(
                    format!("{path}.url"),
                    format!("unsupported scheme {:?}, expected http or https", parsed.scheme()),
                )),
                Err(e) => out.push(Violation::new(format!("{path}.url"), e.to_string())),
            }
            if let Err(reason) = check_relative_dir(dir) {
                out.push(Violation::new(format!("{path}.dir"), reason));
            }
        }
        DatasetRef::File(file) => {
            if file.as_os_str().is_empty() {
                out.push(Violation::new(path, "file path must not be empty"));
            }
        }
        DatasetRef::Data(pairs) => {
            if pairs.is_empty() {
                out.push(Violation::new(path, "inline data must contain at least one pair"));
            }
        }
    }
}

fn check_relative_dir(dir: &Path) -> std::result::Result<(), String> {
    if dir.as_os_str().is_empty() {
        return Err("must not be empty".to_string());
    }
    if dir
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!(
            "{} must be a relative path without `..` components",
            dir.display()
        ));
    }
    Ok(())
}

fn check_costs(path: &str, costs: &CostModel, out: &mut Vec<Violation>) {
    if costs.sub == 0 && costs.extend == 0 {
        out.push(Violation::new(
            path,
            "sub and extend cannot both be zero: every alignment would be free",
        ));
    }
}

fn check_algo(path: &str, algo: &AlgoSpec, out: &mut Vec<Violation>) {
    match algo {
        AlgoSpec::Edlib => {}
        AlgoSpec::Wfa(params) => check_wfa_heuristic(&format!("{path}.heuristic"), &params.heuristic, out),
        AlgoSpec::AstarPa2(params) => check_astarpa2(path, params, out),
        AlgoSpec::BlockAligner(params) => check_block_size(&format!("{path}.size"), &params.size, out),
    }
}

fn check_wfa_heuristic(path: &str, heuristic: &WfaHeuristic, out: &mut Vec<Violation>) {
    match heuristic {
        WfaHeuristic::BandedStatic {
            band_min_k,
            band_max_k,
        }
        | WfaHeuristic::BandedAdaptive {
            band_min_k,
            band_max_k,
            ..
        } if band_min_k > band_max_k => {
            out.push(Violation::new(
                path,
                format!("band_min_k ({band_min_k}) exceeds band_max_k ({band_max_k})"),
            ));
        }
        _ => {}
    }
}

fn check_astarpa2(path: &str, params: &AstarPa2Params, out: &mut Vec<Violation>) {
    let h = &params.heuristic;
    if h.kind.uses_seeds() {
        if h.k == 0 {
            out.push(Violation::new(format!("{path}.heuristic.k"), "seed length must be positive"));
        } else if h.r == 0 || h.r > h.k {
            out.push(Violation::new(
                format!("{path}.heuristic.r"),
                format!("must be between 1 and k ({})", h.k),
            ));
        }
    }

    if params.block_width == 0 {
        out.push(Violation::new(format!("{path}.block_width"), "must be positive"));
    }

    match params.doubling {
        DoublingType::BandDoubling { factor, .. } if !(factor.is_finite() && factor > 1.0) => {
            out.push(Violation::new(
                format!("{path}.doubling.factor"),
                format!("must be greater than 1, got {factor}"),
            ));
        }
        DoublingType::LinearSearch { delta: 0, .. } => {
            out.push(Violation::new(format!("{path}.doubling.delta"), "must be positive"));
        }
        _ => {}
    }
}

fn check_block_size(path: &str, size: &BlockSize, out: &mut Vec<Violation>) {
    match *size {
        BlockSize::Size(min, max) => {
            if min == 0 {
                out.push(Violation::new(path, "minimum block size must be positive"));
            }
            if min > max {
                out.push(Violation::new(
                    path,
                    format!("lower bound {min} exceeds upper bound {max}"),
                ));
            }
        }
        BlockSize::Percent(lo, hi) => {
            let in_range = |p: f64| p.is_finite() && p > 0.0 && p <= 1.0;
            if !in_range(lo) || !in_range(hi) {
                out.push(Violation::new(path, "percentages must lie in (0, 1]"));
            }
            if lo > hi {
                out.push(Violation::new(
                    path,
                    format!("lower bound {lo} exceeds upper bound {hi}"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{BlockAlignerParams, WfaParams};
    use crate::units::ByteSize;
    use std::path::PathBuf;
    use std::time::Duration;

    fn suite() -> Suite {
        Suite {
            time_limit: Duration::from_secs(60),
            mem_limit: ByteSize::gib(1),
            datasets: vec![DatasetRef::Download {
                url: "https://example.org/a.zip".to_string(),
                dir: PathBuf::from("a"),
            }],
            traces: vec![false],
            costs: vec![CostModel::UNIT],
            algos: vec![AlgoSpec::Edlib],
        }
    }

    fn violations(suite: Suite) -> Vec<Violation> {
        match validate_suites(&[suite]) {
            Ok(()) => vec![],
            Err(e) => e.violations().to_vec(),
        }
    }

    #[test]
    fn test_valid_suite_passes() {
        assert!(validate_suites(&[suite()]).is_ok());
    }

    #[test]
    fn test_no_suites_rejected() {
        assert!(matches!(validate_suites(&[]), Err(ConfigError::Empty)));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut s = suite();
        s.time_limit = Duration::ZERO;
        s.mem_limit = ByteSize(0);
        let v = violations(s);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].path, "suite[0].time_limit");
        assert_eq!(v[1].path, "suite[0].mem_limit");
    }

    #[test]
    fn test_empty_lists_rejected() {
        let mut s = suite();
        s.traces.clear();
        s.algos.clear();
        let paths: Vec<_> = violations(s).into_iter().map(|v| v.path).collect();
        assert_eq!(paths, vec!["suite[0].traces", "suite[0].algos"]);
    }

    #[test]
    fn test_block_aligner_bounds() {
        let mut s = suite();
        s.algos = vec![AlgoSpec::BlockAligner(BlockAlignerParams {
            size: BlockSize::Percent(0.01, 0.001),
        })];
        let v = violations(s);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].path, "suite[0].algos[0].size");
        assert!(v[0].reason.contains("exceeds"));

        let mut s = suite();
        s.algos = vec![AlgoSpec::BlockAligner(BlockAlignerParams {
            size: BlockSize::Percent(0.001, 0.01),
        })];
        assert!(violations(s).is_empty());

        let mut s = suite();
        s.algos = vec![AlgoSpec::BlockAligner(BlockAlignerParams {
            size: BlockSize::Size(256, 64),
        })];
        assert_eq!(violations(s).len(), 1);
    }

    #[test]
    fn test_download_rules() {
        let mut s = suite();
        s.datasets = vec![
            DatasetRef::Download {
                url: "ftp://example.org/a.zip".to_string(),
                dir: PathBuf::from("a"),
            },
            DatasetRef::Download {
                url: "https://example.org/b.zip".to_string(),
                dir: PathBuf::from("../escape"),
            },
            DatasetRef::Download {
                url: "https://example.org/c.zip".to_string(),
                dir: PathBuf::from("a"),
            },
        ];
        let paths: Vec<_> = violations(s).into_iter().map(|v| v.path).collect();
        assert_eq!(
            paths,
            vec![
                "suite[0].datasets[0].url",
                "suite[0].datasets[1].dir",
                "suite[0].datasets[2].dir",
            ]
        );
    }

    #[test]
    fn test_same_dir_in_different_suites_allowed() {
        assert!(validate_suites(&[suite(), suite()]).is_ok());
    }

    #[test]
    fn test_free_costs_rejected() {
        let mut s = suite();
        s.costs = vec![CostModel {
            sub: 0,
            open: 3,
            extend: 0,
        }];
        assert_eq!(violations(s)[0].path, "suite[0].costs[0]");
    }

    #[test]
    fn test_wfa_band_order() {
        let mut s = suite();
        s.algos = vec![AlgoSpec::Wfa(WfaParams {
            heuristic: WfaHeuristic::BandedStatic {
                band_min_k: 10,
                band_max_k: -10,
            },
            ..WfaParams::default()
        })];
        assert_eq!(violations(s)[0].path, "suite[0].algos[0].heuristic");
    }

    #[test]
    fn test_astarpa2_seed_rules() {
        let yaml = r#"
!AstarPa2
name: bad
domain: !Astar
heuristic: { type: !GCSH, prune: Both, k: 4, r: 5, p: 14 }
doubling: !BandDoubling { start: !H0, factor: 1.0 }
block_width: 256
"#;
        let mut s = suite();
        s.algos = vec![serde_yaml::from_str(yaml).unwrap()];
        let paths: Vec<_> = violations(s).into_iter().map(|v| v.path).collect();
        assert_eq!(
            paths,
            vec!["suite[0].algos[0].heuristic.r", "suite[0].algos[0].doubling.factor"]
        );
    }
}
