//! Evolution layer - a generic genetic-algorithm engine.
//!
//! [`EvolutionaryOptimizer`] owns one [`Population`] and advances it one
//! generation per [`EvolutionaryOptimizer::evolve`] call, composing the
//! selection, crossover, mutation and survivor strategies named in its
//! [`EvolutionConfig`].

#![warn(missing_docs, unused_crate_dependencies)]

mod config;
mod crossover;
mod error;
mod fitness;
mod metrics;
mod mutation;
mod optimizer;
mod population;
mod selection;
mod survivor;

pub use config::EvolutionConfig;
pub use crossover::{one_point, two_point, CrossoverMethod};
pub use error::{EvolutionError, Result};
pub use fitness::{FallibleFitness, FitnessFunction};
pub use metrics::{EvolutionRun, FitnessHistory, GenerationResult, GenerationStats};
pub use mutation::Mutator;
pub use optimizer::EvolutionaryOptimizer;
pub use population::Population;
pub use selection::SelectionMethod;
pub use survivor::SurvivorMethod;
