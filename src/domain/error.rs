//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::NodeId;

/// Domain errors represent violations of the forest's structural rules.
/// These are independent of how the forest is stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("node {node} cannot be placed under {parent}")]
    InvalidParent { node: NodeId, parent: NodeId },

    #[error("inconsistent bounds at node {node}: {reason}")]
    InconsistentBounds { node: NodeId, reason: String },
}
