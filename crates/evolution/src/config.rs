//! Optimizer configuration.

use serde::{Deserialize, Serialize};
use crate::{CrossoverMethod, EvolutionError, Result, SelectionMethod, SurvivorMethod};

/// Configuration for the evolutionary optimizer.
///
/// Every field is optional on the wire and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionConfig {
    /// Target population size after every generation
    #[serde(default = "default_population_size")]
    pub population_size: usize,

    /// Genes per individual
    #[serde(default = "default_genome_length")]
    pub genome_length: usize,

    /// Parent selection method
    #[serde(default)]
    pub selection_method: SelectionMethod,

    /// Draws per tournament
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,

    /// Parents selected per generation (defaults to population size)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_parents: Option<usize>,

    /// Offspring produced per generation (defaults to population size)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_offspring: Option<usize>,

    /// Crossover method
    #[serde(default)]
    pub crossover_method: CrossoverMethod,

    /// Per-gene mutation probability
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,

    /// Maximum mutation perturbation
    #[serde(default = "default_mutation_amount")]
    pub mutation_amount: f64,

    /// Survivor selection method
    #[serde(default)]
    pub survivor_method: SurvivorMethod,

    /// Fraction of the current population kept by elitism
    #[serde(default = "default_elitism_rate")]
    pub elitism_rate: f64,

    /// Maximum retained history entries
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_population_size() -> usize {
    50
}

fn default_genome_length() -> usize {
    10
}

fn default_tournament_size() -> usize {
    5
}

fn default_mutation_rate() -> f64 {
    0.01
}

fn default_mutation_amount() -> f64 {
    0.1
}

fn default_elitism_rate() -> f64 {
    0.1
}

fn default_history_cap() -> usize {
    100
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            genome_length: default_genome_length(),
            selection_method: SelectionMethod::default(),
            tournament_size: default_tournament_size(),
            num_parents: None,
            num_offspring: None,
            crossover_method: CrossoverMethod::default(),
            mutation_rate: default_mutation_rate(),
            mutation_amount: default_mutation_amount(),
            survivor_method: SurvivorMethod::default(),
            elitism_rate: default_elitism_rate(),
            history_cap: default_history_cap(),
        }
    }
}

impl EvolutionConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Set genome length.
    pub fn with_genome_length(mut self, length: usize) -> Self {
        self.genome_length = length;
        self
    }

    /// Set selection method.
    pub fn with_selection(mut self, method: SelectionMethod) -> Self {
        self.selection_method = method;
        self
    }

    /// Set tournament size.
    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size;
        self
    }

    /// Set crossover method.
    pub fn with_crossover(mut self, method: CrossoverMethod) -> Self {
        self.crossover_method = method;
        self
    }

    /// Set mutation rate and amount.
    pub fn with_mutation(mut self, rate: f64, amount: f64) -> Self {
        self.mutation_rate = rate;
        self.mutation_amount = amount;
        self
    }

    /// Set survivor method.
    pub fn with_survivor(mut self, method: SurvivorMethod) -> Self {
        self.survivor_method = method;
        self
    }

    /// Set elitism rate.
    pub fn with_elitism_rate(mut self, rate: f64) -> Self {
        self.elitism_rate = rate;
        self
    }

    /// Set parent and offspring counts.
    pub fn with_counts(mut self, num_parents: usize, num_offspring: usize) -> Self {
        self.num_parents = Some(num_parents);
        self.num_offspring = Some(num_offspring);
        self
    }

    /// Set history cap.
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /// Parents per generation.
    pub fn parents_per_generation(&self) -> usize {
        self.num_parents.unwrap_or(self.population_size)
    }

    /// Offspring per generation.
    pub fn offspring_per_generation(&self) -> usize {
        self.num_offspring.unwrap_or(self.population_size)
    }

    /// Reject settings that cannot produce a valid generation.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(EvolutionError::InvalidConfig(msg.to_string())) };

        if self.population_size == 0 {
            return invalid("population size must be at least 1");
        }
        if self.tournament_size == 0 {
            return invalid("tournament size must be at least 1");
        }
        if self.parents_per_generation() == 0 {
            return invalid("number of parents must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid("mutation rate must be within [0, 1]");
        }
        if !self.mutation_amount.is_finite() || self.mutation_amount < 0.0 {
            return invalid("mutation amount must be a non-negative number");
        }
        if !(0.0..=1.0).contains(&self.elitism_rate) {
            return invalid("elitism rate must be within [0, 1]");
        }
        if self.history_cap == 0 {
            return invalid("history cap must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvolutionConfig::default();
        assert_eq!(config.selection_method, SelectionMethod::Tournament);
        assert_eq!(config.tournament_size, 5);
        assert_eq!(config.crossover_method, CrossoverMethod::Uniform);
        assert_eq!(config.mutation_rate, 0.01);
        assert_eq!(config.mutation_amount, 0.1);
        assert_eq!(config.survivor_method, SurvivorMethod::Elitism);
        assert_eq!(config.elitism_rate, 0.1);
        assert_eq!(config.history_cap, 100);
        assert_eq!(config.parents_per_generation(), config.population_size);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_with_unknown_methods() {
        let config: EvolutionConfig = serde_json::from_str(
            r#"{ "populationSize": 8, "selectionMethod": "sus", "crossoverMethod": "twopoint", "survivorMethod": "?" }"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 8);
        assert_eq!(config.selection_method, SelectionMethod::Tournament);
        assert_eq!(config.crossover_method, CrossoverMethod::TwoPoint);
        assert_eq!(config.survivor_method, SurvivorMethod::Elitism);
        assert_eq!(config.genome_length, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EvolutionConfig::new().with_population_size(0).validate().is_err());
        assert!(EvolutionConfig::new().with_tournament_size(0).validate().is_err());
        assert!(EvolutionConfig::new().with_mutation(1.5, 0.1).validate().is_err());
        assert!(EvolutionConfig::new().with_mutation(0.1, -0.1).validate().is_err());
        assert!(EvolutionConfig::new().with_elitism_rate(-0.1).validate().is_err());
        assert!(EvolutionConfig::new().with_history_cap(0).validate().is_err());
        assert!(EvolutionConfig::new().with_counts(0, 5).validate().is_err());
    }
}
