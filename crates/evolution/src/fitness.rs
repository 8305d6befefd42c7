//! Fitness function seam.

use evolab_core::Individual;

/// Scores an individual. Supplied by the caller.
///
/// Implementations must not touch the population being evolved; the optimizer
/// calls `evaluate` once per individual per generation.
pub trait FitnessFunction {
    /// Compute the fitness of `individual`, or explain why it cannot be scored.
    fn evaluate(&self, individual: &Individual) -> Result<f64, String>;
}

impl<F> FitnessFunction for F
where
    F: Fn(&Individual) -> f64,
{
    fn evaluate(&self, individual: &Individual) -> Result<f64, String> {
        Ok(self(individual))
    }
}

/// Adapter for fitness closures that can fail.
pub struct FallibleFitness<F>(pub F);

impl<F> FitnessFunction for FallibleFitness<F>
where
    F: Fn(&Individual) -> Result<f64, String>,
{
    fn evaluate(&self, individual: &Individual) -> Result<f64, String> {
        (self.0)(individual)
    }
}
