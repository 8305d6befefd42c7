//! Transfer options and merge strategies.

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// Rule for combining a matching target/source scalar.
///
/// Unknown names fall back to [`MergeStrategy::Average`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MergeStrategy {
    /// Source value wins
    Replace,
    /// `target * (1 - weight) + source * weight`
    Weighted,
    /// Larger of the two
    Max,
    /// Arithmetic mean
    #[default]
    Average,
}

impl MergeStrategy {
    /// Resolve a strategy name, falling back to average.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "replace" => Self::Replace,
            "weighted" => Self::Weighted,
            "max" => Self::Max,
            _ => Self::Average,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Weighted => "weighted",
            Self::Max => "max",
            Self::Average => "average",
        }
    }

    /// Combine one target value with the matching source value. `weight` is
    /// the source's share and is clamped to `[0, 1]`.
    pub fn combine(&self, target: f64, source: f64, weight: f64) -> f64 {
        match self {
            Self::Replace => source,
            Self::Weighted => {
                let w = weight.clamp(0.0, 1.0);
                target * (1.0 - w) + source * w
            }
            Self::Max => target.max(source),
            Self::Average => (target + source) / 2.0,
        }
    }
}

impl From<String> for MergeStrategy {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<MergeStrategy> for String {
    fn from(s: MergeStrategy) -> Self {
        s.as_str().to_string()
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single knowledge transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOptions {
    /// How matching entries are combined
    #[serde(default = "default_merge_strategy")]
    pub merge_strategy: MergeStrategy,

    /// Source share for the weighted strategy, in [0, 1]
    #[serde(default = "default_merge_weight")]
    pub merge_weight: f64,

    /// Minimum compatibility score required to merge
    #[serde(default = "default_compatibility_threshold")]
    pub compatibility_threshold: f64,
}

fn default_merge_strategy() -> MergeStrategy {
    MergeStrategy::Weighted
}

fn default_merge_weight() -> f64 {
    0.5
}

fn default_compatibility_threshold() -> f64 {
    0.7
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            merge_strategy: default_merge_strategy(),
            merge_weight: default_merge_weight(),
            compatibility_threshold: default_compatibility_threshold(),
        }
    }
}

impl TransferOptions {
    /// Set merge strategy.
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Set merge weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.merge_weight = weight;
        self
    }

    /// Set compatibility threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.compatibility_threshold = threshold;
        self
    }

    /// Reject a weight or threshold that is NaN, infinite or outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        let in_unit_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if !in_unit_range(self.merge_weight) {
            return Err(KnowledgeError::InvalidOptions(format!(
                "merge weight must be within [0, 1], got {}",
                self.merge_weight
            )));
        }
        if !in_unit_range(self.compatibility_threshold) {
            return Err(KnowledgeError::InvalidOptions(format!(
                "compatibility threshold must be within [0, 1], got {}",
                self.compatibility_threshold
            )));
        }
        Ok(())
    }
}
