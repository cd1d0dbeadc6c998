//! Benchmark suite configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algo::AlgoSpec;
use crate::cost::CostModel;
use crate::units::{self, ByteSize};

/// One top-level benchmark block.
///
/// Every dataset is aligned with every combination of `traces`, `costs` and
/// `algos`, each run bounded by `time_limit` and `mem_limit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    /// CPU time limit per aligner invocation.
    #[serde(with = "units::duration")]
    pub time_limit: Duration,

    /// Memory limit per aligner invocation.
    pub mem_limit: ByteSize,

    /// Input datasets.
    pub datasets: Vec<DatasetRef>,

    /// Whether to request a full alignment (cigar) or only the cost.
    pub traces: Vec<bool>,

    /// Cost models to align under.
    pub costs: Vec<CostModel>,

    /// Aligners and parameter sets to compare.
    pub algos: Vec<AlgoSpec>,
}

impl Suite {
    /// Number of jobs each dataset of this suite expands into.
    pub fn configurations_per_dataset(&self) -> usize {
        self.traces.len() * self.costs.len() * self.algos.len()
    }
}

/// Where the sequence pairs of a dataset come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub enum DatasetRef {
    /// A remote zip archive of `.seq` files, extracted into `dir` under the
    /// data directory.
    Download { url: String, dir: PathBuf },

    /// A local `.seq` file.
    File(PathBuf),

    /// Inline sequence pairs. Only meant for small inputs.
    Data(Vec<(String, String)>),
}

impl DatasetRef {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            DatasetRef::Download { url, .. } => url.clone(),
            DatasetRef::File(path) => path.display().to_string(),
            DatasetRef::Data(pairs) => format!("{} inline pair(s)", pairs.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
time_limit: 3600s
mem_limit: 32GiB
datasets:
  - !Download
    url: https://example.org/data/ont-500k.zip
    dir: ont-500k
traces: [false, true]
costs: [{ sub: 1, open: 0, extend: 1 }]
algos:
  - !Edlib
  - !BlockAligner { size: !Percent [0.01, 0.1] }
"#;

    #[test]
    fn test_parse_suite() {
        let suite: Suite = serde_yaml::from_str(SUITE).unwrap();
        assert_eq!(suite.time_limit, Duration::from_secs(3600));
        assert_eq!(suite.mem_limit, ByteSize::gib(32));
        assert_eq!(
            suite.datasets,
            vec![DatasetRef::Download {
                url: "https://example.org/data/ont-500k.zip".to_string(),
                dir: PathBuf::from("ont-500k"),
            }]
        );
        assert_eq!(suite.traces, vec![false, true]);
        assert_eq!(suite.costs, vec![CostModel::UNIT]);
        assert_eq!(suite.algos.len(), 2);
        assert_eq!(suite.configurations_per_dataset(), 4);
    }

    #[test]
    fn test_missing_field_rejected() {
        let without_algos = SUITE.replace("algos:", "unused:");
        let err = serde_yaml::from_str::<Suite>(&without_algos).unwrap_err();
        assert!(err.to_string().contains("unused") || err.to_string().contains("algos"));

        let yaml = "time_limit: 1s\nmem_limit: 1GiB\ndatasets: []\ntraces: []\ncosts: []\n";
        let err = serde_yaml::from_str::<Suite>(yaml).unwrap_err();
        assert!(err.to_string().contains("algos"));
    }

    #[test]
    fn test_inline_data_dataset() {
        let dataset: DatasetRef = serde_yaml::from_str("!Data [[ACGT, AGT], [A, C]]").unwrap();
        assert_eq!(dataset.describe(), "2 inline pair(s)");
    }
}
