use serde::Deserialize;
use strum_macros::{Display, EnumString};

/// Global size-vs-speed preference steering constant materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OptimizePreference {
    /// Fold a constant only when it feeds few consumers.
    #[default]
    Balanced,
    /// Fold only uniquely-consumed constants, never duplicating shared
    /// weights into multiple descriptors.
    Smallest,
    /// Fold aggressively to avoid runtime weight-fetch edges, even at the
    /// cost of model size.
    Fastest,
}

impl OptimizePreference {
    /// Largest consumer ("link") count for which a constant weight is still
    /// folded into the operator descriptor.
    pub fn fold_limit(&self) -> usize {
        match self {
            OptimizePreference::Balanced => 4,
            OptimizePreference::Smallest => 1,
            OptimizePreference::Fastest => 100,
        }
    }
}

/// Options consulted by the import driver and transforms.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub optimize: OptimizePreference,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn preference_parses_from_string() {
        assert_eq!(
            OptimizePreference::from_str("smallest").unwrap(),
            OptimizePreference::Smallest
        );
        assert_eq!(
            OptimizePreference::from_str("Fastest").unwrap(),
            OptimizePreference::Fastest
        );
    }

    #[test]
    fn fold_limits() {
        assert_eq!(OptimizePreference::Balanced.fold_limit(), 4);
        assert_eq!(OptimizePreference::Smallest.fold_limit(), 1);
        assert_eq!(OptimizePreference::Fastest.fold_limit(), 100);
    }
}
