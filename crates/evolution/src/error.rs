//! Evolution error types.

use evolab_core::IndividualId;

/// Error type for evolution operations.
pub type Result<T> = std::result::Result<T, EvolutionError>;

/// Errors that abort a generational step.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    /// Configuration cannot produce a valid population
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The fitness function reported a failure
    #[error("fitness evaluation failed for {individual}: {reason}")]
    Fitness {
        /// Individual being evaluated
        individual: IndividualId,
        /// Reason given by the fitness function
        reason: String,
    },

    /// The fitness function returned NaN or an infinity
    #[error("fitness for {individual} is not finite: {value}")]
    InvalidFitness {
        /// Individual being evaluated
        individual: IndividualId,
        /// Offending value
        value: f64,
    },

    /// Evolve was called with nothing to evolve
    #[error("population is empty")]
    EmptyPopulation,

    /// Individuals disagree on genome length
    #[error("genome length mismatch: expected {expected}, found {found}")]
    GenomeLength {
        /// Length of the first individual
        expected: usize,
        /// Length of the offending individual
        found: usize,
    },
}
