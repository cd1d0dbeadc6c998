//! Edit-distance cost models.

use serde::{Deserialize, Serialize};

/// Gap-affine edit-distance costs.
///
/// A gap of length `n` costs `open + n * extend`; a mismatch costs `sub`.
/// Matches are free.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct CostModel {
    pub sub: u32,
    pub open: u32,
    pub extend: u32,
}

impl CostModel {
    /// Unit costs: plain Levenshtein distance.
    pub const UNIT: CostModel = CostModel {
        sub: 1,
        open: 0,
        extend: 1,
    };

    pub fn is_unit(&self) -> bool {
        *self == Self::UNIT
    }

    /// Whether gaps carry an opening penalty.
    pub fn is_affine(&self) -> bool {
        self.open > 0
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::UNIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_costs() {
        assert!(CostModel::UNIT.is_unit());
        assert!(!CostModel::UNIT.is_affine());
        let affine = CostModel {
            sub: 4,
            open: 6,
            extend: 2,
        };
        assert!(!affine.is_unit());
        assert!(affine.is_affine());
    }

    #[test]
    fn test_rejects_negative_and_unknown_fields() {
        assert!(serde_yaml::from_str::<CostModel>("{ sub: -1, open: 0, extend: 1 }").is_err());
        assert!(serde_yaml::from_str::<CostModel>("{ sub: 1, open: 0, extend: 1, match: 0 }").is_err());
        assert!(serde_yaml::from_str::<CostModel>("{ sub: 1, open: 0 }").is_err());
    }
}
