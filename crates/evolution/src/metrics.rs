//! Per-generation fitness metrics.

use std::collections::VecDeque;
use evolab_core::Individual;
use serde::{Deserialize, Serialize};

/// Aggregate fitness of one generation's population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number
    pub generation: u64,
    /// Lowest fitness
    pub min: f64,
    /// Highest fitness
    pub max: f64,
    /// Mean fitness
    pub avg: f64,
}

impl GenerationStats {
    /// Summarize a population. Returns zeros for an empty slice.
    pub fn from_population(generation: u64, individuals: &[Individual]) -> Self {
        if individuals.is_empty() {
            return Self { generation, min: 0.0, max: 0.0, avg: 0.0 };
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for ind in individuals {
            min = min.min(ind.fitness);
            max = max.max(ind.fitness);
            sum += ind.fitness;
        }

        Self {
            generation,
            min,
            max,
            avg: sum / individuals.len() as f64,
        }
    }
}

/// Bounded history of generation stats; the oldest entry is dropped once the
/// cap is exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessHistory {
    entries: VecDeque<GenerationStats>,
    cap: usize,
}

impl FitnessHistory {
    /// Create an empty history holding at most `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Append, evicting from the front when full.
    pub fn push(&mut self, stats: GenerationStats) {
        self.entries.push_back(stats);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&GenerationStats> {
        self.entries.back()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &GenerationStats> {
        self.entries.iter()
    }

    /// Owned copy, oldest first.
    pub fn snapshot(&self) -> Vec<GenerationStats> {
        self.entries.iter().copied().collect()
    }
}

/// Outcome of a single `evolve()` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Generation reached
    pub generation: u64,
    /// Population size after survivor selection
    pub population_size: usize,
    /// Best fitness seen so far (best-ever individual)
    pub best_fitness: f64,
    /// Mean fitness of the new population
    pub average_fitness: f64,
}

/// Outcome of `evolve_multiple(n)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionRun {
    /// Final generation counter
    pub generation: u64,
    /// One entry per completed generation
    pub results: Vec<GenerationResult>,
    /// Best-ever individual
    pub best_individual: Option<Individual>,
    /// History snapshot, oldest first
    pub history: Vec<GenerationStats>,
}
