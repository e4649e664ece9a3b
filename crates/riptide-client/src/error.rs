//! Error types for the client facade.

use riptide_core::error::{QueryError, SchemaError};

use crate::codec::CodecError;
use crate::collaborator::{ExecutionError, WriteError};

/// Errors from client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Schema derivation error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Query composition or compilation error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Execution collaborator error
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Topic write error
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Value codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Context configuration is incomplete or contradictory
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation is not supported on this handle
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A table was requested for a record type without key fields
    #[error("Type '{0}' declares no key fields; tables require a key")]
    TableRequiresKey(String),

    /// Source not found in the catalog
    #[error("Source '{0}' not found")]
    SourceNotFound(String),

    /// The handle or context has been disposed
    #[error("Object has been disposed")]
    ObjectDisposed,
}
