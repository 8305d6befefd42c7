//! evolab core data models.
//!
//! This crate defines the data shared by the evolutionary optimizer and the
//! knowledge transfer broker: identifiers, individuals, and tagged knowledge
//! payloads.

#![warn(missing_docs)]

// Core identities
mod id;

// Evolution
mod individual;

// Knowledge
mod knowledge;

// Re-exports
pub use id::*;

pub use individual::{Individual, IndividualMetadata};

pub use knowledge::{
    ActionTable, KnowledgeAttributes, RepresentationKind, PayloadError,
    KnowledgePayload, TabularKnowledge, PolicyKnowledge, DeepQKnowledge,
    NetworkArchitecture, NetworkWeightsKnowledge, WeightLayer, GenericKnowledge,
    KnowledgeRecord, RecordMetadata,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
