//! Population model - the state evolved each generation.

use evolab_core::Individual;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::metrics::FitnessHistory;

/// Individuals plus generational bookkeeping.
///
/// This is the natural unit of persistence for an optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    /// Current individuals; order is only stable within a generation
    pub individuals: Vec<Individual>,

    /// Generations completed since initialization
    pub generation: u64,

    /// Deep copy of the fittest individual ever seen
    pub best_ever: Option<Individual>,

    /// Bounded per-generation stats
    pub history: FitnessHistory,
}

impl Population {
    /// Wrap an existing set of individuals at generation 0.
    pub fn new(individuals: Vec<Individual>, history_cap: usize) -> Self {
        Self {
            individuals,
            generation: 0,
            best_ever: None,
            history: FitnessHistory::new(history_cap),
        }
    }

    /// Generate `size` founders whose genes are drawn uniformly from `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(
        size: usize,
        genome_length: usize,
        history_cap: usize,
        rng: &mut R,
    ) -> Self {
        let individuals = (0..size)
            .map(|_| {
                let genome = (0..genome_length).map(|_| rng.gen::<f64>()).collect();
                Individual::new(genome, 0)
            })
            .collect();
        Self::new(individuals, history_cap)
    }

    /// Number of individuals.
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the population is empty.
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Fittest current individual; the first one wins ties.
    pub fn fittest(&self) -> Option<&Individual> {
        fittest(&self.individuals)
    }

    /// Replace the best-ever record with a copy of the current fittest
    /// individual if it strictly improves on it. Returns whether it did.
    pub fn record_best(&mut self) -> bool {
        let Some(candidate) = fittest(&self.individuals) else {
            return false;
        };
        let improved = match &self.best_ever {
            Some(best) => candidate.fitness > best.fitness,
            None => true,
        };
        if improved {
            self.best_ever = Some(candidate.clone());
        }
        improved
    }
}

pub(crate) fn fittest(individuals: &[Individual]) -> Option<&Individual> {
    individuals.iter().fold(None, |best: Option<&Individual>, ind| match best {
        Some(b) if b.fitness >= ind.fitness => Some(b),
        _ => Some(ind),
    })
}
