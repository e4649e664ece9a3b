//! Compiled statement values.

/// What a compiled statement does when submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `CREATE STREAM …`
    CreateStream,
    /// `CREATE TABLE …`
    CreateTable,
    /// `SELECT …`
    Select,
    /// `INSERT INTO …`
    Insert,
    /// `DROP STREAM|TABLE …`
    Drop,
}

/// A rendered statement: pure, serializable, replayable.
///
/// The text is the bit-exact contract with the external engine; it is
/// handed to the execution collaborator unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    /// Statement kind.
    pub kind: StatementKind,
    /// Statement text, terminated with `;`.
    pub text: String,
}

impl CompiledStatement {
    /// Build a statement value.
    #[must_use]
    pub fn new(kind: StatementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
