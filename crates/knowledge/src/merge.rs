//! Merging one payload into another of the same kind.

use evolab_core::{
    ActionTable, DeepQKnowledge, KnowledgePayload, NetworkWeightsKnowledge, PolicyKnowledge,
    TabularKnowledge, WeightLayer,
};
use serde::{Deserialize, Serialize};

use crate::options::MergeStrategy;

/// Counters describing what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    /// States present only in the source, copied in
    pub new_states: usize,
    /// States present in both payloads
    pub updated_states: usize,
    /// Actions copied in from the source
    pub new_actions: usize,
    /// Actions combined with an existing target value
    pub updated_actions: usize,
    /// Network weights combined element-wise
    pub updated_weights: usize,
    /// Mean absolute change of every combined value
    pub average_change: f64,
}

/// Outcome of a merge. A failed merge carries no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    /// Whether `knowledge` holds a merged payload
    pub success: bool,
    /// Merged payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<KnowledgePayload>,
    /// What changed
    pub stats: MergeStats,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MergeResult {
    /// Successful merge.
    pub fn merged(knowledge: KnowledgePayload, stats: MergeStats) -> Self {
        Self {
            success: true,
            knowledge: Some(knowledge),
            stats,
            message: None,
        }
    }

    /// Failed merge; the target stays untouched.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            knowledge: None,
            stats: MergeStats::default(),
            message: Some(message.into()),
        }
    }
}

/// Combines a source payload into a target payload.
///
/// Implementations must not mutate either input; the merged payload is
/// returned in the [`MergeResult`].
pub trait KnowledgeMerger {
    /// Merge `source` into a copy of `target`.
    fn merge(
        &self,
        target: &KnowledgePayload,
        source: &KnowledgePayload,
        strategy: MergeStrategy,
        weight: f64,
    ) -> MergeResult;
}

/// Default merger with one routine per representation kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    /// Create a merge engine.
    pub fn new() -> Self {
        Self
    }
}

impl KnowledgeMerger for MergeEngine {
    fn merge(
        &self,
        target: &KnowledgePayload,
        source: &KnowledgePayload,
        strategy: MergeStrategy,
        weight: f64,
    ) -> MergeResult {
        use KnowledgePayload::*;

        let combiner = Combiner { strategy, weight };
        match (target, source) {
            (Tabular(t), Tabular(s)) => merge_tabular(t, s, combiner),
            (PolicyGradient(t), PolicyGradient(s)) => merge_policy(t, s, combiner),
            (DeepQ(t), DeepQ(s)) => merge_deep_q(t, s, combiner),
            (NetworkWeights(t), NetworkWeights(s)) => merge_network(t, s, combiner),
            (Generic(t), Generic(s)) if t.kind == s.kind => {
                MergeResult::failed(format!("No merge routine for '{}' knowledge", t.kind))
            }
            _ => MergeResult::failed(format!(
                "Cannot merge {} knowledge into {} knowledge",
                source.kind(),
                target.kind()
            )),
        }
    }
}

#[derive(Clone, Copy)]
struct Combiner {
    strategy: MergeStrategy,
    weight: f64,
}

/// Running stats while combining values.
#[derive(Default)]
struct Tally {
    stats: MergeStats,
    total_change: f64,
    combined: usize,
}

impl Tally {
    fn combine(&mut self, combiner: Combiner, target: f64, source: f64) -> f64 {
        let merged = combiner.strategy.combine(target, source, combiner.weight);
        self.total_change += (merged - target).abs();
        self.combined += 1;
        merged
    }

    fn finish(mut self) -> MergeStats {
        if self.combined > 0 {
            self.stats.average_change = self.total_change / self.combined as f64;
        }
        self.stats
    }
}

/// Merge two state/action tables. Returns the merged table and the states it
/// touched, in order.
fn merge_tables(
    target: &ActionTable,
    source: &ActionTable,
    combiner: Combiner,
    tally: &mut Tally,
) -> (ActionTable, Vec<String>) {
    let mut merged = target.clone();
    let mut touched = Vec::with_capacity(source.len());

    for (state, source_actions) in source {
        touched.push(state.clone());
        let Some(target_actions) = merged.get_mut(state) else {
            tally.stats.new_states += 1;
            tally.stats.new_actions += source_actions.len();
            merged.insert(state.clone(), source_actions.clone());
            continue;
        };

        tally.stats.updated_states += 1;
        for (action, &value) in source_actions {
            match target_actions.get_mut(action) {
                Some(existing) => {
                    *existing = tally.combine(combiner, *existing, value);
                    tally.stats.updated_actions += 1;
                }
                None => {
                    target_actions.insert(action.clone(), value);
                    tally.stats.new_actions += 1;
                }
            }
        }
    }

    (merged, touched)
}

fn merge_tabular(t: &TabularKnowledge, s: &TabularKnowledge, combiner: Combiner) -> MergeResult {
    let (Some(tq), Some(sq)) = (&t.q_table, &s.q_table) else {
        return MergeResult::failed("Insufficient data: both payloads need a Q-table");
    };

    let mut tally = Tally::default();
    let (q_table, _) = merge_tables(tq, sq, combiner, &mut tally);
    let merged = TabularKnowledge {
        q_table: Some(q_table),
        learning_rate: t.learning_rate.or(s.learning_rate),
        discount_factor: t.discount_factor.or(s.discount_factor),
    };
    MergeResult::merged(KnowledgePayload::Tabular(merged), tally.finish())
}

fn merge_policy(t: &PolicyKnowledge, s: &PolicyKnowledge, combiner: Combiner) -> MergeResult {
    let (Some(tp), Some(sp)) = (&t.policy, &s.policy) else {
        return MergeResult::failed("Insufficient data: both payloads need a policy");
    };

    let mut tally = Tally::default();
    let (mut policy, touched) = merge_tables(tp, sp, combiner, &mut tally);
    for state in &touched {
        if let Some(actions) = policy.get_mut(state) {
            normalize_distribution(actions.values_mut());
        }
    }

    let merged = PolicyKnowledge {
        policy: Some(policy),
        learning_rate: t.learning_rate.or(s.learning_rate),
        discount_factor: t.discount_factor.or(s.discount_factor),
    };
    MergeResult::merged(KnowledgePayload::PolicyGradient(merged), tally.finish())
}

/// Clamp negatives to zero and rescale to sum to one. An all-zero
/// distribution becomes uniform.
pub(crate) fn normalize_distribution<'a>(probs: impl Iterator<Item = &'a mut f64>) {
    let mut probs: Vec<&mut f64> = probs.collect();
    if probs.is_empty() {
        return;
    }

    let mut sum = 0.0;
    for p in probs.iter_mut() {
        if !(**p > 0.0) {
            **p = 0.0;
        }
        sum += **p;
    }

    if sum > 0.0 && sum.is_finite() {
        for p in probs.iter_mut() {
            **p /= sum;
        }
    } else {
        let uniform = 1.0 / probs.len() as f64;
        for p in probs.iter_mut() {
            **p = uniform;
        }
    }
}

/// Element-wise combine of equally shaped weight arrays.
fn combine_weights(target: &[f64], source: &[f64], combiner: Combiner, tally: &mut Tally) -> Vec<f64> {
    target
        .iter()
        .zip(source)
        .map(|(&t, &s)| tally.combine(combiner, t, s))
        .collect()
}

fn merge_deep_q(t: &DeepQKnowledge, s: &DeepQKnowledge, combiner: Combiner) -> MergeResult {
    let (Some(ta), Some(sa)) = (&t.architecture, &s.architecture) else {
        return MergeResult::failed("Insufficient data: both networks need an architecture");
    };
    let (Some(tw), Some(sw)) = (&t.weights, &s.weights) else {
        return MergeResult::failed("Insufficient data: both networks need weights");
    };

    if ta.input_dimension != sa.input_dimension
        || ta.output_dimension != sa.output_dimension
        || ta.hidden_layers != sa.hidden_layers
    {
        return MergeResult::failed(format!(
            "Architecture mismatch: {}->{:?}->{} vs {}->{:?}->{}",
            ta.input_dimension,
            ta.hidden_layers,
            ta.output_dimension,
            sa.input_dimension,
            sa.hidden_layers,
            sa.output_dimension
        ));
    }
    if tw.len() != sw.len() {
        return MergeResult::failed(format!(
            "Weight layer count mismatch: {} vs {}",
            tw.len(),
            sw.len()
        ));
    }
    if let Some(i) = tw.iter().zip(sw).position(|(a, b)| a.len() != b.len()) {
        return MergeResult::failed(format!(
            "Weight layer {i} length mismatch: {} vs {}",
            tw[i].len(),
            sw[i].len()
        ));
    }

    let mut tally = Tally::default();
    let weights = tw
        .iter()
        .zip(sw)
        .map(|(a, b)| combine_weights(a, b, combiner, &mut tally))
        .collect();
    tally.stats.updated_weights = tally.combined;

    let merged = DeepQKnowledge {
        weights: Some(weights),
        architecture: Some(ta.clone()),
        learning_rate: t.learning_rate.or(s.learning_rate),
        discount_factor: t.discount_factor.or(s.discount_factor),
    };
    MergeResult::merged(KnowledgePayload::DeepQ(merged), tally.finish())
}

fn merge_network(
    t: &NetworkWeightsKnowledge,
    s: &NetworkWeightsKnowledge,
    combiner: Combiner,
) -> MergeResult {
    let (Some(tl), Some(sl)) = (&t.layers, &s.layers) else {
        return MergeResult::failed("Insufficient data: both networks need layers");
    };

    if tl.len() != sl.len() {
        return MergeResult::failed(format!("Layer count mismatch: {} vs {}", tl.len(), sl.len()));
    }
    for (i, (a, b)) in tl.iter().zip(sl).enumerate() {
        if a.shape != b.shape || a.values.len() != b.values.len() {
            return MergeResult::failed(format!(
                "Layer {i} mismatch: {:?} ({} values) vs {:?} ({} values)",
                a.shape,
                a.values.len(),
                b.shape,
                b.values.len()
            ));
        }
    }

    let mut tally = Tally::default();
    let layers = tl
        .iter()
        .zip(sl)
        .map(|(a, b)| WeightLayer {
            shape: a.shape.clone(),
            values: combine_weights(&a.values, &b.values, combiner, &mut tally),
        })
        .collect();
    tally.stats.updated_weights = tally.combined;

    let merged = NetworkWeightsKnowledge {
        layers: Some(layers),
        learning_rate: t.learning_rate.or(s.learning_rate),
    };
    MergeResult::merged(KnowledgePayload::NetworkWeights(merged), tally.finish())
}
