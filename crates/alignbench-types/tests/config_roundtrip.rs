//! Integration tests for loading, validating and re-serializing suites.

use std::time::Duration;

use alignbench_types::{
    parse_suites, to_yaml, AlgoSpec, BlockSize, ByteSize, ConfigError, CostModel, DatasetRef,
    HeuristicType, WfaMemoryModel, ALGO_TAGS,
};

const TOOLS: &str = include_str!("../../../evals/experiments/tools.yaml");

/// Test: the bundled experiment parses and every suite has positive limits
#[test]
fn test_bundled_experiment_parses() {
    let suites = parse_suites(TOOLS).expect("bundled experiment must be valid");
    assert_eq!(suites.len(), 2);

    for suite in &suites {
        assert!(suite.time_limit > Duration::ZERO);
        assert!(suite.mem_limit > ByteSize(0));
        for algo in &suite.algos {
            assert!(ALGO_TAGS.contains(&algo.tag()));
        }
    }

    let first = &suites[0];
    assert_eq!(first.time_limit, Duration::from_secs(3600));
    assert_eq!(first.mem_limit, ByteSize::gib(32));
    assert_eq!(first.datasets.len(), 2);
    assert!(matches!(&first.datasets[0], DatasetRef::Download { dir, .. } if dir.ends_with("ont-ul-500k")));
    assert_eq!(first.costs, vec![CostModel::UNIT]);

    let AlgoSpec::Wfa(wfa) = &first.algos[1] else {
        panic!("second algo should be Wfa");
    };
    assert_eq!(wfa.memory_model, WfaMemoryModel::MemoryUltraLow);

    let AlgoSpec::AstarPa2(astar) = &first.algos[2] else {
        panic!("third algo should be AstarPa2");
    };
    assert_eq!(astar.heuristic.kind, HeuristicType::Gcsh);
    assert_eq!(astar.heuristic.k, 12);
    assert!(astar.front.dt_trace);
    assert_eq!(astar.front.max_g, 40);

    assert_eq!(
        first.algos[3],
        AlgoSpec::BlockAligner(alignbench_types::BlockAlignerParams {
            size: BlockSize::Percent(0.01, 0.1)
        })
    );
}

/// Test: serializing a parsed configuration and re-parsing yields the same structure
#[test]
fn test_roundtrip_preserves_structure() {
    let suites = parse_suites(TOOLS).unwrap();
    let yaml = to_yaml(&suites).unwrap();
    let reparsed = parse_suites(&yaml).expect("serialized configuration must reparse");
    assert_eq!(suites, reparsed);
}

/// Test: an unknown aligner tag fails fast
#[test]
fn test_unknown_algo_tag_rejected() {
    let yaml = TOOLS.replacen("- !Edlib", "- !Ksw2", 1);
    let err = parse_suites(&yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));
    assert!(err.to_string().contains("Ksw2"));
}

/// Test: an inverted block-size percentage range is rejected with its path
#[test]
fn test_inverted_percent_range_rejected() {
    let yaml = TOOLS.replace("!Percent [0.01, 0.1]", "!Percent [0.1, 0.01]");
    let err = parse_suites(&yaml).unwrap_err();
    let violations = err.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, "suite[0].algos[3].size");
}

/// Test: a missing required suite field is a parse error
#[test]
fn test_missing_mem_limit_rejected() {
    let yaml = TOOLS.replacen("  mem_limit: 32GiB\n", "", 1);
    let err = parse_suites(&yaml).unwrap_err();
    assert!(err.to_string().contains("mem_limit"));
}
