//! Compatibility scoring between two knowledge payloads.
//!
//! Scores are always in `[0, 1]`. Structural mismatches that make a merge
//! impossible are reported as `compatible: false`; missing fields get a fixed
//! moderate-low score that is still treated as compatible.

use std::collections::BTreeMap;
use evolab_core::{
    ActionTable, DeepQKnowledge, KnowledgePayload, NetworkWeightsKnowledge,
};
use serde::{Deserialize, Serialize};

/// Score given when a required field is absent.
pub const MISSING_FIELD_SCORE: f64 = 0.3;
/// Score for kinds without dedicated support.
pub const UNKNOWN_KIND_SCORE: f64 = 0.5;
/// Deep-Q input or output dimensionality differs.
pub const DIMENSION_MISMATCH_SCORE: f64 = 0.1;
/// Network layer counts differ.
pub const LAYER_COUNT_MISMATCH_SCORE: f64 = 0.2;
/// Network layer shapes differ.
pub const LAYER_SHAPE_MISMATCH_SCORE: f64 = 0.3;

const DEFAULT_LEARNING_RATE: f64 = 0.1;
const DEFAULT_DISCOUNT_FACTOR: f64 = 0.99;
const DEFAULT_ACTIVATION: &str = "relu";

/// Outcome of scoring two payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    /// Score in [0, 1]
    pub score: f64,
    /// Whether a merge can be attempted at all
    pub compatible: bool,
    /// Human-readable explanation
    pub reason: String,
    /// Kind-specific components of the score
    pub breakdown: CompatibilityBreakdown,
}

/// Components behind a compatibility score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CompatibilityBreakdown {
    /// Tabular or policy-gradient tables
    Table {
        /// Shared states over the larger state count
        state_overlap: f64,
        /// Mean action overlap across shared states
        action_overlap: f64,
        /// Hyperparameter similarity
        parameter_similarity: f64,
        /// Number of shared states
        common_states: usize,
    },
    /// Deep-Q networks
    DeepQ {
        /// 1 when input and output dimensions agree
        dimension_match: f64,
        /// Per-layer size ratio, or 0.5 when layer counts differ
        hidden_layer_similarity: f64,
        /// 1 when activations agree
        activation_match: f64,
        /// Hyperparameter similarity
        parameter_similarity: f64,
    },
    /// Generic layered weights
    NetworkWeights {
        /// 1 when every layer shape agrees
        shapes_match: f64,
        /// Learning-rate similarity
        learning_rate_similarity: f64,
    },
    /// Nothing to break down
    None,
}

impl CompatibilityResult {
    fn scored(score: f64, reason: impl Into<String>, breakdown: CompatibilityBreakdown) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            compatible: true,
            reason: reason.into(),
            breakdown,
        }
    }

    fn rejected(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score,
            compatible: false,
            reason: reason.into(),
            breakdown: CompatibilityBreakdown::None,
        }
    }

    fn missing(what: &str) -> Self {
        Self::scored(
            MISSING_FIELD_SCORE,
            format!("Missing {what}; assuming partial compatibility"),
            CompatibilityBreakdown::None,
        )
    }
}

/// Scores how safely two payloads of the same kind can be merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityScorer;

impl CompatibilityScorer {
    /// Create a scorer.
    pub fn new() -> Self {
        Self
    }

    /// Score `source` against `target`.
    pub fn score(&self, source: &KnowledgePayload, target: &KnowledgePayload) -> CompatibilityResult {
        use KnowledgePayload::*;

        match (source, target) {
            (Tabular(s), Tabular(t)) => match (&s.q_table, &t.q_table) {
                (Some(sq), Some(tq)) => {
                    let params = parameter_similarity(
                        (s.learning_rate, s.discount_factor),
                        (t.learning_rate, t.discount_factor),
                    );
                    score_tables(sq, tq, params, "Q-table")
                }
                _ => CompatibilityResult::missing("Q-table"),
            },
            (PolicyGradient(s), PolicyGradient(t)) => match (&s.policy, &t.policy) {
                (Some(sp), Some(tp)) => {
                    let params = parameter_similarity(
                        (s.learning_rate, s.discount_factor),
                        (t.learning_rate, t.discount_factor),
                    );
                    score_tables(sp, tp, params, "policy")
                }
                _ => CompatibilityResult::missing("policy"),
            },
            (DeepQ(s), DeepQ(t)) => score_deep_q(s, t),
            (NetworkWeights(s), NetworkWeights(t)) => score_network(s, t),
            (Generic(s), Generic(t)) if s.kind == t.kind => CompatibilityResult::scored(
                UNKNOWN_KIND_SCORE,
                format!("Unknown representation kind '{}'; no dedicated scoring", s.kind),
                CompatibilityBreakdown::None,
            ),
            _ => CompatibilityResult::rejected(
                0.0,
                format!(
                    "Representation kinds differ: {} vs {}",
                    source.kind(),
                    target.kind()
                ),
            ),
        }
    }
}

/// `|common| / max(1, max(|a|, |b|))`
fn overlap<K: Ord, V>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> (f64, usize) {
    let common = a.keys().filter(|k| b.contains_key(*k)).count();
    let denom = a.len().max(b.len()).max(1);
    (common as f64 / denom as f64, common)
}

fn score_tables(a: &ActionTable, b: &ActionTable, params: f64, label: &str) -> CompatibilityResult {
    let (state_overlap, common_states) = overlap(a, b);

    let action_overlap = if common_states == 0 {
        0.0
    } else {
        let total: f64 = a
            .iter()
            .filter_map(|(state, actions)| b.get(state).map(|other| overlap(actions, other).0))
            .sum();
        total / common_states as f64
    };

    let score = 0.5 * state_overlap + 0.3 * action_overlap + 0.2 * params;
    CompatibilityResult::scored(
        score,
        format!(
            "{label}: {common_states} shared states ({:.0}% state overlap, {:.0}% action overlap)",
            state_overlap * 100.0,
            action_overlap * 100.0
        ),
        CompatibilityBreakdown::Table {
            state_overlap,
            action_overlap,
            parameter_similarity: params,
            common_states,
        },
    )
}

fn similarity(a: f64, b: f64) -> f64 {
    (1.0 - (a - b).abs()).clamp(0.0, 1.0)
}

/// Mean of learning-rate and discount-factor similarity.
fn parameter_similarity(a: (Option<f64>, Option<f64>), b: (Option<f64>, Option<f64>)) -> f64 {
    let lr = similarity(
        a.0.unwrap_or(DEFAULT_LEARNING_RATE),
        b.0.unwrap_or(DEFAULT_LEARNING_RATE),
    );
    let gamma = similarity(
        a.1.unwrap_or(DEFAULT_DISCOUNT_FACTOR),
        b.1.unwrap_or(DEFAULT_DISCOUNT_FACTOR),
    );
    (lr + gamma) / 2.0
}

fn score_deep_q(s: &DeepQKnowledge, t: &DeepQKnowledge) -> CompatibilityResult {
    let (Some(sa), Some(ta)) = (&s.architecture, &t.architecture) else {
        return CompatibilityResult::missing("network architecture");
    };

    if sa.input_dimension != ta.input_dimension || sa.output_dimension != ta.output_dimension {
        return CompatibilityResult::rejected(
            DIMENSION_MISMATCH_SCORE,
            format!(
                "Dimension mismatch: {}->{} vs {}->{}",
                sa.input_dimension, sa.output_dimension, ta.input_dimension, ta.output_dimension
            ),
        );
    }

    let dimension_match = 1.0;
    let hidden_layer_similarity = if sa.hidden_layers.len() == ta.hidden_layers.len() {
        if sa.hidden_layers.is_empty() {
            1.0
        } else {
            let total: f64 = sa
                .hidden_layers
                .iter()
                .zip(&ta.hidden_layers)
                .map(|(&x, &y)| {
                    let (lo, hi) = (x.min(y), x.max(y));
                    if hi == 0 { 1.0 } else { lo as f64 / hi as f64 }
                })
                .sum();
            total / sa.hidden_layers.len() as f64
        }
    } else {
        0.5
    };
    let activation_match = if sa.activation.as_deref().unwrap_or(DEFAULT_ACTIVATION)
        == ta.activation.as_deref().unwrap_or(DEFAULT_ACTIVATION)
    {
        1.0
    } else {
        0.0
    };
    let params = parameter_similarity(
        (s.learning_rate, s.discount_factor),
        (t.learning_rate, t.discount_factor),
    );

    let score = 0.4 * dimension_match
        + 0.3 * hidden_layer_similarity
        + 0.1 * activation_match
        + 0.2 * params;
    CompatibilityResult::scored(
        score,
        format!("Deep-Q networks share dimensions {}->{}", sa.input_dimension, sa.output_dimension),
        CompatibilityBreakdown::DeepQ {
            dimension_match,
            hidden_layer_similarity,
            activation_match,
            parameter_similarity: params,
        },
    )
}

fn score_network(s: &NetworkWeightsKnowledge, t: &NetworkWeightsKnowledge) -> CompatibilityResult {
    let (Some(sl), Some(tl)) = (&s.layers, &t.layers) else {
        return CompatibilityResult::missing("network layers");
    };

    if sl.len() != tl.len() {
        return CompatibilityResult::rejected(
            LAYER_COUNT_MISMATCH_SCORE,
            format!("Layer count mismatch: {} vs {}", sl.len(), tl.len()),
        );
    }
    if let Some(i) = sl.iter().zip(tl).position(|(a, b)| a.shape != b.shape) {
        return CompatibilityResult::rejected(
            LAYER_SHAPE_MISMATCH_SCORE,
            format!("Layer {i} shape mismatch: {:?} vs {:?}", sl[i].shape, tl[i].shape),
        );
    }

    let shapes_match = 1.0;
    let learning_rate_similarity = similarity(
        s.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
        t.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
    );
    CompatibilityResult::scored(
        0.7 * shapes_match + 0.3 * learning_rate_similarity,
        format!("All {} layer shapes match", sl.len()),
        CompatibilityBreakdown::NetworkWeights {
            shapes_match,
            learning_rate_similarity,
        },
    )
}
