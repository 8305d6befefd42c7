//! Evolutionary optimizer - runs one generational step at a time.

use evolab_core::Individual;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::metrics::{EvolutionRun, GenerationResult, GenerationStats};
use crate::population::{fittest, Population};
use crate::{EvolutionConfig, EvolutionError, FitnessFunction, Mutator, Result};

/// Owns one population and evolves it against a caller-supplied fitness
/// function.
///
/// A generation runs in a fixed order: evaluate, select parents, recombine,
/// mutate, select survivors, then record bookkeeping. Nothing is written back
/// to the population until every step has succeeded.
pub struct EvolutionaryOptimizer<F> {
    config: EvolutionConfig,
    fitness: F,
    population: Population,
    rng: StdRng,
}

impl<F: FitnessFunction> EvolutionaryOptimizer<F> {
    /// Create an optimizer with a random initial population, seeded from OS
    /// entropy.
    pub fn new(config: EvolutionConfig, fitness: F) -> Result<Self> {
        Self::with_rng(config, fitness, StdRng::from_entropy())
    }

    /// Create a reproducible optimizer.
    pub fn with_seed(config: EvolutionConfig, fitness: F, seed: u64) -> Result<Self> {
        Self::with_rng(config, fitness, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: EvolutionConfig, fitness: F, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let population = Population::new(Vec::new(), config.history_cap);
        let mut optimizer = Self {
            config,
            fitness,
            population,
            rng,
        };
        optimizer.initialize(None)?;
        Ok(optimizer)
    }

    /// Reset the population.
    ///
    /// A supplied population is used verbatim, whatever its size; otherwise
    /// `population_size` founders are generated. The generation counter,
    /// best-ever record and history are cleared either way.
    pub fn initialize(&mut self, initial: Option<Vec<Individual>>) -> Result<()> {
        let population = match initial {
            Some(individuals) => {
                check_genome_lengths(&individuals)?;
                Population::new(individuals, self.config.history_cap)
            }
            None => Population::random(
                self.config.population_size,
                self.config.genome_length,
                self.config.history_cap,
                &mut self.rng,
            ),
        };

        debug!(size = population.len(), "Initialized population");
        self.population = population;
        Ok(())
    }

    /// Run one full generation.
    pub fn evolve(&mut self) -> Result<GenerationResult> {
        if self.population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let next_generation = self.population.generation + 1;

        // Evaluate
        let mut current = self.population.individuals.clone();
        for ind in current.iter_mut() {
            ind.fitness = evaluate(&self.fitness, ind)?;
        }

        // Select parents and recombine. Enough children are bred to refill a
        // population smaller than the configured size.
        let num_offspring = self
            .config
            .offspring_per_generation()
            .max(self.config.population_size.saturating_sub(current.len()));
        let mut offspring = Vec::with_capacity(num_offspring);
        {
            let parents = self.config.selection_method.select(
                &current,
                self.config.parents_per_generation(),
                self.config.tournament_size,
                &mut self.rng,
            );
            for _ in 0..num_offspring {
                let a = parents[self.rng.gen_range(0..parents.len())];
                let b = parents[self.rng.gen_range(0..parents.len())];
                offspring.push(self.config.crossover_method.crossover(a, b, next_generation, &mut self.rng));
            }
        }

        // Mutate, then score offspring so survivor selection can rank them
        let mutator = Mutator::new(self.config.mutation_rate, self.config.mutation_amount);
        let mut mutated_genes = 0;
        for child in offspring.iter_mut() {
            mutated_genes += mutator.mutate(child, &mut self.rng);
            child.fitness = evaluate(&self.fitness, child)?;
        }

        // Select survivors
        let survivors = self.config.survivor_method.select(
            current,
            offspring,
            self.config.population_size,
            self.config.elitism_rate,
        );

        // Commit
        let stats = GenerationStats::from_population(next_generation, &survivors);
        self.population.individuals = survivors;
        self.population.generation = next_generation;
        let improved = self.population.record_best();
        self.population.history.push(stats);

        let best_fitness = self
            .population
            .best_ever
            .as_ref()
            .map(|b| b.fitness)
            .unwrap_or(stats.max);

        debug!(
            generation = next_generation,
            best = best_fitness,
            max = stats.max,
            avg = stats.avg,
            mutated_genes,
            improved,
            "Generation complete"
        );

        Ok(GenerationResult {
            generation: next_generation,
            population_size: self.population.len(),
            best_fitness,
            average_fitness: stats.avg,
        })
    }

    /// Run `n` generations back to back.
    ///
    /// A failure stops the run: generations that already completed stay
    /// committed and the failing one leaves no trace.
    pub fn evolve_multiple(&mut self, n: usize) -> Result<EvolutionRun> {
        let mut results = Vec::with_capacity(n);
        for _ in 0..n {
            results.push(self.evolve()?);
        }

        if let Some(last) = results.last() {
            info!(
                generations = n,
                generation = last.generation,
                best = last.best_fitness,
                avg = last.average_fitness,
                "Evolution run finished"
            );
        }

        Ok(EvolutionRun {
            generation: self.population.generation,
            results,
            best_individual: self.population.best_ever.clone(),
            history: self.population.history.snapshot(),
        })
    }

    /// Current population.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Individuals of the current population.
    pub fn individuals(&self) -> &[Individual] {
        &self.population.individuals
    }

    /// Generations completed since initialization.
    pub fn generation(&self) -> u64 {
        self.population.generation
    }

    /// Best individual ever seen.
    pub fn best_individual(&self) -> Option<&Individual> {
        self.population.best_ever.as_ref()
    }

    /// Fittest individual of the current population (as last evaluated).
    pub fn current_best(&self) -> Option<&Individual> {
        fittest(&self.population.individuals)
    }

    /// Per-generation stats, oldest first.
    pub fn history(&self) -> Vec<GenerationStats> {
        self.population.history.snapshot()
    }

    /// Active configuration.
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }
}

fn evaluate<F: FitnessFunction>(fitness: &F, individual: &Individual) -> Result<f64> {
    let value = fitness
        .evaluate(individual)
        .map_err(|reason| EvolutionError::Fitness {
            individual: individual.id,
            reason,
        })?;
    if !value.is_finite() {
        return Err(EvolutionError::InvalidFitness {
            individual: individual.id,
            value,
        });
    }
    Ok(value)
}

fn check_genome_lengths(individuals: &[Individual]) -> Result<()> {
    let Some(first) = individuals.first() else {
        return Ok(());
    };
    let expected = first.genome_len();
    match individuals.iter().find(|i| i.genome_len() != expected) {
        Some(bad) => Err(EvolutionError::GenomeLength {
            expected,
            found: bad.genome_len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CrossoverMethod, FallibleFitness, SelectionMethod, SurvivorMethod};
    use std::cell::Cell;

    fn mean_gene(ind: &Individual) -> f64 {
        ind.genome.iter().sum::<f64>() / ind.genome.len().max(1) as f64
    }

    fn small_config() -> EvolutionConfig {
        EvolutionConfig::new()
            .with_population_size(20)
            .with_genome_length(8)
    }

    #[test]
    fn test_new_builds_random_population() {
        let opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, 1).unwrap();
        assert_eq!(opt.individuals().len(), 20);
        assert_eq!(opt.generation(), 0);
        assert!(opt.best_individual().is_none());
        assert!(opt.history().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = EvolutionaryOptimizer::with_seed(small_config().with_population_size(0), mean_gene, 1);
        assert!(matches!(result, Err(EvolutionError::InvalidConfig(_))));
    }

    #[test]
    fn test_evolve_advances_bookkeeping() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, 2).unwrap();
        let result = opt.evolve().unwrap();

        assert_eq!(result.generation, 1);
        assert_eq!(result.population_size, 20);
        assert_eq!(opt.generation(), 1);
        assert_eq!(opt.history().len(), 1);
        assert_eq!(opt.history()[0].generation, 1);
        assert_eq!(opt.best_individual().unwrap().fitness, result.best_fitness);
    }

    #[test]
    fn test_initialize_uses_supplied_population_verbatim() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, 3).unwrap();
        opt.evolve().unwrap();

        let seeded = vec![Individual::new(vec![0.5; 8], 0), Individual::new(vec![0.25; 8], 0)];
        let ids: Vec<_> = seeded.iter().map(|i| i.id).collect();
        opt.initialize(Some(seeded)).unwrap();

        assert_eq!(opt.individuals().iter().map(|i| i.id).collect::<Vec<_>>(), ids);
        assert_eq!(opt.generation(), 0);
        assert!(opt.history().is_empty());
        assert!(opt.best_individual().is_none());

        // The next generation grows back to the configured size.
        assert_eq!(opt.evolve().unwrap().population_size, 20);
    }

    #[test]
    fn test_small_seed_population_refills_with_few_offspring() {
        let config = small_config().with_population_size(10).with_counts(2, 3);
        let mut opt = EvolutionaryOptimizer::with_seed(config, mean_gene, 17).unwrap();
        opt.initialize(Some(vec![
            Individual::new(vec![0.5; 8], 0),
            Individual::new(vec![0.25; 8], 0),
        ]))
        .unwrap();

        let result = opt.evolve().unwrap();
        assert_eq!(result.population_size, 10);
        assert_eq!(opt.individuals().len(), 10);

        // Once refilled, the configured offspring count is enough again.
        assert_eq!(opt.evolve().unwrap().population_size, 10);
    }

    #[test]
    fn test_initialize_rejects_ragged_genomes() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, 3).unwrap();
        let ragged = vec![Individual::new(vec![0.5; 8], 0), Individual::new(vec![0.5; 3], 0)];
        assert!(matches!(
            opt.initialize(Some(ragged)),
            Err(EvolutionError::GenomeLength { expected: 8, found: 3 })
        ));
    }

    #[test]
    fn test_evolve_empty_population_fails() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, 4).unwrap();
        opt.initialize(Some(Vec::new())).unwrap();
        assert!(matches!(opt.evolve(), Err(EvolutionError::EmptyPopulation)));
    }

    #[test]
    fn test_fitness_failure_commits_nothing() {
        let calls = Cell::new(0usize);
        let fitness = FallibleFitness(|ind: &Individual| {
            calls.set(calls.get() + 1);
            if calls.get() > 30 {
                Err("simulator crashed".to_string())
            } else {
                Ok(mean_gene(ind))
            }
        });
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), fitness, 5).unwrap();
        let before = opt.population().clone();

        let err = opt.evolve().unwrap_err();
        assert!(matches!(err, EvolutionError::Fitness { .. }));
        assert_eq!(opt.population(), &before);
    }

    #[test]
    fn test_non_finite_fitness_is_rejected() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), |_: &Individual| f64::NAN, 6).unwrap();
        assert!(matches!(opt.evolve(), Err(EvolutionError::InvalidFitness { .. })));
        assert_eq!(opt.generation(), 0);
    }

    #[test]
    fn test_evolve_multiple_keeps_completed_generations_on_failure() {
        let calls = Cell::new(0usize);
        // 20 current + 20 offspring evaluations per generation
        let fitness = FallibleFitness(|ind: &Individual| {
            calls.set(calls.get() + 1);
            if calls.get() > 100 {
                Err("out of budget".to_string())
            } else {
                Ok(mean_gene(ind))
            }
        });
        let mut opt = EvolutionaryOptimizer::with_seed(small_config(), fitness, 7).unwrap();
        assert!(opt.evolve_multiple(5).is_err());
        assert_eq!(opt.generation(), 2);
        assert_eq!(opt.history().len(), 2);
    }

    #[test]
    fn test_evolve_multiple_reports_every_generation() {
        let config = small_config()
            .with_selection(SelectionMethod::Rank)
            .with_crossover(CrossoverMethod::TwoPoint)
            .with_survivor(SurvivorMethod::Mixed);
        let mut opt = EvolutionaryOptimizer::with_seed(config, mean_gene, 8).unwrap();
        let run = opt.evolve_multiple(10).unwrap();

        assert_eq!(run.generation, 10);
        assert_eq!(run.results.len(), 10);
        assert_eq!(run.history.len(), 10);
        assert_eq!(run.best_individual.as_ref().map(|b| b.fitness), Some(run.results[9].best_fitness));
    }

    #[test]
    fn test_history_respects_cap() {
        let mut opt = EvolutionaryOptimizer::with_seed(small_config().with_history_cap(3), mean_gene, 9).unwrap();
        opt.evolve_multiple(7).unwrap();
        let gens: Vec<u64> = opt.history().iter().map(|s| s.generation).collect();
        assert_eq!(gens, vec![5, 6, 7]);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = |seed| {
            let mut opt = EvolutionaryOptimizer::with_seed(small_config(), mean_gene, seed).unwrap();
            opt.evolve_multiple(5).unwrap();
            opt.individuals().iter().map(|i| i.genome.clone()).collect::<Vec<_>>()
        };
        assert_eq!(run(10), run(10));
    }

    #[test]
    fn test_mixed_survivors_improve_mean_gene() {
        let config = small_config()
            .with_population_size(30)
            .with_survivor(SurvivorMethod::Mixed)
            .with_mutation(0.1, 0.2);
        let mut opt = EvolutionaryOptimizer::with_seed(config, mean_gene, 12).unwrap();
        let first = opt.evolve().unwrap();
        let run = opt.evolve_multiple(30).unwrap();
        assert!(run.results.last().unwrap().average_fitness > first.average_fitness);
    }
}
