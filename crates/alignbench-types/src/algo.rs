//! Aligner selection and per-aligner tuning parameters.
//!
//! Each variant of [`AlgoSpec`] carries its own parameter struct. Parameter
//! structs deny unknown fields, so a field belonging to one aligner is
//! rejected when written under another.

use serde::{Deserialize, Serialize};

/// YAML tags of every known aligner variant.
pub const ALGO_TAGS: [&str; 4] = ["Edlib", "Wfa", "AstarPa2", "BlockAligner"];

/// Which aligner to benchmark, along with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlgoSpec {
    Edlib,
    Wfa(WfaParams),
    AstarPa2(AstarPa2Params),
    BlockAligner(BlockAlignerParams),
}

impl AlgoSpec {
    /// The variant tag as written in configuration files.
    pub fn tag(&self) -> &'static str {
        match self {
            AlgoSpec::Edlib => "Edlib",
            AlgoSpec::Wfa(_) => "Wfa",
            AlgoSpec::AstarPa2(_) => "AstarPa2",
            AlgoSpec::BlockAligner(_) => "BlockAligner",
        }
    }

    /// Lowercase name passed to backends and used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AlgoSpec::Edlib => "edlib",
            AlgoSpec::Wfa(_) => "wfa",
            AlgoSpec::AstarPa2(_) => "astarpa2",
            AlgoSpec::BlockAligner(_) => "block_aligner",
        }
    }
}

// ---------------------------------------------------------------------------
// WFA
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WfaParams {
    #[serde(default)]
    pub memory_model: WfaMemoryModel,
    #[serde(default)]
    pub heuristic: WfaHeuristic,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WfaMemoryModel {
    #[default]
    MemoryHigh,
    MemoryMed,
    MemoryLow,
    MemoryUltraLow,
}

/// Wavefront reduction heuristics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub enum WfaHeuristic {
    #[default]
    None,
    BandedStatic {
        band_min_k: i32,
        band_max_k: i32,
    },
    BandedAdaptive {
        band_min_k: i32,
        band_max_k: i32,
        steps_between_cutoffs: u32,
    },
    WFAdaptive {
        min_wavefront_length: u32,
        max_distance_threshold: u32,
        steps_between_cutoffs: u32,
    },
    XDrop {
        x_drop: u32,
        steps_between_cutoffs: u32,
    },
    ZDrop {
        z_drop: u32,
        steps_between_cutoffs: u32,
    },
}

// ---------------------------------------------------------------------------
// A*PA2
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AstarPa2Params {
    /// Free-form label distinguishing parameter sets in results.
    #[serde(default)]
    pub name: String,
    pub domain: Domain,
    pub heuristic: HeuristicParams,
    pub doubling: DoublingType,
    pub block_width: u32,
    #[serde(default)]
    pub front: FrontParams,
    #[serde(default)]
    pub sparse_h: bool,
    #[serde(default)]
    pub prune: bool,
}

/// The part of the DP matrix that is explored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Domain {
    Dijkstra,
    GapStart,
    GapGap,
    Astar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HeuristicParams {
    #[serde(rename = "type")]
    pub kind: HeuristicType,
    #[serde(default)]
    pub prune: Prune,
    /// Seed length.
    #[serde(default)]
    pub k: u32,
    /// Maximum match cost plus one.
    #[serde(default)]
    pub r: u32,
    /// Number of seeds that must be pruned before the heuristic is recomputed.
    #[serde(default)]
    pub p: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeuristicType {
    None,
    Zero,
    Gap,
    #[serde(rename = "SH")]
    Sh,
    #[serde(rename = "CSH")]
    Csh,
    #[serde(rename = "GCSH")]
    Gcsh,
}

impl HeuristicType {
    /// Seed heuristics need a seed length `k` and match cost bound `r`.
    pub fn uses_seeds(&self) -> bool {
        matches!(self, HeuristicType::Sh | HeuristicType::Csh | HeuristicType::Gcsh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeuristicType::None => "none",
            HeuristicType::Zero => "zero",
            HeuristicType::Gap => "gap",
            HeuristicType::Sh => "sh",
            HeuristicType::Csh => "csh",
            HeuristicType::Gcsh => "gcsh",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Prune {
    None,
    Start,
    End,
    #[default]
    Both,
}

impl Prune {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prune::None => "none",
            Prune::Start => "start",
            Prune::End => "end",
            Prune::Both => "both",
        }
    }
}

/// How the explored band grows when the current bound turns out too small.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub enum DoublingType {
    None,
    BandDoubling { start: DoublingStart, factor: f64 },
    LinearSearch { start: DoublingStart, delta: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DoublingStart {
    Zero,
    Gap,
    H0,
}

impl DoublingStart {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoublingStart::Zero => "zero",
            DoublingStart::Gap => "gap",
            DoublingStart::H0 => "h0",
        }
    }
}

/// Block-computation options for the DP front.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct FrontParams {
    pub sparse: bool,
    pub simd: bool,
    pub incremental_doubling: bool,
    pub dt_trace: bool,
    /// Largest distance to trace back using diagonal transition.
    pub max_g: u32,
    /// Drop from the farthest reaching diagonal before trace falls back.
    pub fr_drop: u32,
}

impl Default for FrontParams {
    fn default() -> Self {
        Self {
            sparse: true,
            simd: true,
            incremental_doubling: true,
            dt_trace: false,
            max_g: 40,
            fr_drop: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Block aligner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BlockAlignerParams {
    pub size: BlockSize,
}

/// Block size range, either absolute or relative to the longest sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum BlockSize {
    Size(usize, usize),
    Percent(f64, f64),
}
