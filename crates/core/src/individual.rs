//! Individual model - one candidate solution in a population.

use serde::{Deserialize, Serialize};
use crate::id::IndividualId;
use crate::Time;

/// A candidate solution: a fixed-length genome plus its last assigned fitness.
///
/// Genes always lie in `[0, 1]`. Only `fitness` changes after creation; it is
/// overwritten by the fitness function every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Individual {
    /// Unique identifier
    pub id: IndividualId,

    /// Genes, each in [0, 1]
    pub genome: Vec<f64>,

    /// Caller-assigned fitness
    pub fitness: f64,

    /// Lineage metadata
    pub metadata: IndividualMetadata,
}

/// Where an individual came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualMetadata {
    /// Created at
    pub created_at: Time,

    /// Generation the individual was born into
    pub generation: u64,

    /// Zero, one or two parents
    pub parent_ids: Vec<IndividualId>,
}

impl Individual {
    /// Create a founder individual (no parents) with zero fitness.
    ///
    /// Genes are clamped into `[0, 1]`.
    pub fn new(genome: Vec<f64>, generation: u64) -> Self {
        Self::with_parents(genome, generation, Vec::new())
    }

    /// Create an offspring individual.
    pub fn with_parents(genome: Vec<f64>, generation: u64, parent_ids: Vec<IndividualId>) -> Self {
        Self {
            id: IndividualId::new(),
            genome: genome.into_iter().map(|g| g.clamp(0.0, 1.0)).collect(),
            fitness: 0.0,
            metadata: IndividualMetadata {
                created_at: chrono::Utc::now(),
                generation,
                parent_ids,
            },
        }
    }

    /// Number of genes.
    pub fn genome_len(&self) -> usize {
        self.genome.len()
    }
}
