//! Error types for the core value model.

/// Errors from record metadata extraction and schema generation.
///
/// All variants are fatal for the operation that raised them and are
/// surfaced before any statement text is produced or any network call
/// is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Declarative metadata on the record type is ambiguous or invalid.
    #[error("invalid record metadata: {0}")]
    Configuration(String),

    /// A field type has no wire representation.
    #[error("unsupported field type: {0}")]
    UnsupportedType(String),

    /// A composite type recursively contains itself.
    #[error("schema cycle through composite type '{0}'")]
    SchemaCycle(String),

    /// A key was requested for a type that declares no key fields.
    #[error("type '{0}' declares no key fields")]
    MissingKey(String),
}

/// Errors from query composition and compilation.
///
/// Raised at build or compile time, before the statement reaches the
/// execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A join key selector is not a simple field-access chain.
    #[error("join key selector must be a simple field access, got: {0}")]
    InvalidKeySelector(String),

    /// An aggregate selector is not a simple field-access chain.
    #[error("aggregate selector must be a simple field access, got: {0}")]
    InvalidAggregateSelector(String),

    /// The operator has no mapping in the target query language.
    #[error("operator '{0}' is not supported in compiled queries")]
    UnsupportedOperator(String),

    /// A stream-stream join was composed without a window.
    #[error("stream-stream join between '{left}' and '{right}' requires a window")]
    MissingJoinWindow {
        /// Left-side source name.
        left: String,
        /// Right-side source name.
        right: String,
    },

    /// A window was attached to a join with no stream side.
    #[error("table-table joins cannot carry a window")]
    WindowOnTableJoin,

    /// A window stage was not followed by a grouping or aggregation.
    #[error("a window stage must be followed by group_by or aggregate")]
    WindowWithoutAggregate,

    /// The pipeline shape is invalid for compilation.
    #[error("invalid query shape: {0}")]
    InvalidShape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display() {
        assert_eq!(
            SchemaError::MissingKey("Order".into()).to_string(),
            "type 'Order' declares no key fields"
        );
        assert_eq!(
            SchemaError::SchemaCycle("Node".into()).to_string(),
            "schema cycle through composite type 'Node'"
        );
    }

    #[test]
    fn query_error_display() {
        let err = QueryError::MissingJoinWindow {
            left: "orders".into(),
            right: "payments".into(),
        };
        assert!(err.to_string().contains("requires a window"));
        assert!(QueryError::UnsupportedOperator("+".into())
            .to_string()
            .contains("not supported"));
    }
}
