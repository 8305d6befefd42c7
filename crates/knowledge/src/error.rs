//! Knowledge error types.

use evolab_core::{AgentId, PayloadError, RepresentationKind};

/// Error type for knowledge registry operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Contract violations. Expected business outcomes such as an incompatible
/// transfer are reported as values, never through this type.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// An update tried to change a registered agent's representation kind
    #[error("agent {agent} holds {expected} knowledge, refusing {found} update")]
    KindMismatch {
        /// Agent being updated
        agent: AgentId,
        /// Kind already registered
        expected: RepresentationKind,
        /// Kind of the rejected payload
        found: RepresentationKind,
    },

    /// Transfer options outside their valid ranges
    #[error("invalid transfer options: {0}")]
    InvalidOptions(String),

    /// Agent has no record
    #[error("agent {0} is not registered")]
    NotRegistered(AgentId),

    /// Untyped payload could not be read
    #[error(transparent)]
    Payload(#[from] PayloadError),
}
