//! Knowledge transfer between learning agents.
//!
//! A [`KnowledgeRegistry`] holds what each agent has learned. The
//! [`KnowledgeTransferBroker`] scores a source/target pair with the
//! [`CompatibilityScorer`] and, when the pair clears the threshold, merges the
//! source into the target through a [`KnowledgeMerger`].

#![warn(missing_docs)]

pub mod broker;
pub mod compatibility;
pub mod error;
pub mod merge;
pub mod options;
pub mod registry;

pub use broker::{KnowledgeTransferBroker, TransferOutcome};
pub use compatibility::{CompatibilityBreakdown, CompatibilityResult, CompatibilityScorer};
pub use error::{KnowledgeError, Result};
pub use merge::{KnowledgeMerger, MergeEngine, MergeResult, MergeStats};
pub use options::{MergeStrategy, TransferOptions};
pub use registry::{KnowledgeRegistry, TransferRecord};
