//! Error type shared by the whole crate.
use crate::graph::NodeID;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("label dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Real node ids must be strictly positive so their shadow (`-id`) is distinct.
    #[error("invalid node id {0}: real node ids must be positive")]
    InvalidNode(NodeID),

    #[error("invalid edge {from} -> {to}: weight {weight} must be positive and finite")]
    InvalidWeight { from: NodeID, to: NodeID, weight: f64 },

    #[error("alphabet is sealed, cannot insert {0:?}")]
    AlphabetSealed(String),

    #[error("token {0:?} already exists in the alphabet")]
    DuplicateToken(String),

    #[error("node {0} is seeded more than once")]
    DuplicateSeed(NodeID),

    #[error("{line}: malformed record: {reason}")]
    Malformed { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
