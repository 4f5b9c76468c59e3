/*
Error types for trace generation and proof assembly
*/

use crate::types::Hash;
use alloc::string::{String, ToString};
use thiserror::Error;

/// Errors surfaced by the generator and the trace driver
#[derive(Debug, Error)]
pub enum ProverError {
    /// Generated steps were requested before the trace reached its terminal callback
    #[error("states generation not finished")]
    IncompleteTrace,

    /// No snapshot in the traced range hashes to the requested target
    #[error("no state with hash {0} in the traced range")]
    TargetNotFound(Hash),

    /// The interpreter refused to run the transaction
    #[error("execution halted: {0}")]
    ExecutionHalted(String),

    /// Invalid transaction parameters
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Malformed trace input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Database error
    #[error("database error: {0}")]
    DatabaseError(String),
}

/// Result type for prover operations
pub type Result<T> = core::result::Result<T, ProverError>;

impl From<bincode::Error> for ProverError {
    fn from(err: bincode::Error) -> Self {
        ProverError::SerializationError(err.to_string())
    }
}
