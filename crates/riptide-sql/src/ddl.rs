//! Creation, insertion, and drop statement rendering.
//!
//! All functions here are pure renderers over descriptor and pipeline
//! values; validation that needs record metadata (key presence, schema
//! mapping) happens before a descriptor reaches this module.

use riptide_core::error::QueryError;
use riptide_core::query::{Literal, QueryNode, SourceKind};
use riptide_core::schema::{TopicDescriptor, ValueFormat};

use crate::select::select_body;
use crate::statement::{CompiledStatement, StatementKind};

fn source_keyword(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Stream => "STREAM",
        SourceKind::Table => "TABLE",
    }
}

fn statement_kind(kind: SourceKind) -> StatementKind {
    match kind {
        SourceKind::Stream => StatementKind::CreateStream,
        SourceKind::Table => StatementKind::CreateTable,
    }
}

fn with_properties(descriptor: &TopicDescriptor) -> String {
    let mut props = vec![
        format!("KAFKA_TOPIC='{}'", descriptor.name),
        format!("VALUE_FORMAT='{}'", descriptor.value_format.as_str()),
        format!("PARTITIONS={}", descriptor.partitions),
        format!("REPLICAS={}", descriptor.replication),
    ];
    if !descriptor.key_columns.is_empty() {
        let keys: Vec<String> = descriptor
            .key_columns
            .iter()
            .map(|k| format!("'{k}'"))
            .collect();
        props.push(format!("KEY={}", keys.join(",")));
    }
    if let Some(column) = &descriptor.timestamp_column {
        props.push(format!("TIMESTAMP='{column}'"));
        if let Some(format) = &descriptor.timestamp_format {
            props.push(format!("TIMESTAMP_FORMAT='{format}'"));
        }
    }
    props.join(", ")
}

/// Render `CREATE STREAM|TABLE IF NOT EXISTS` for a topic descriptor.
///
/// Column names are uppercased in the schema list; the `WITH` clause
/// carries topic binding, format, sizing, and the key/timestamp columns
/// the descriptor declares. `IF NOT EXISTS` makes re-submission
/// idempotent on the engine side.
#[must_use]
pub fn create_source(descriptor: &TopicDescriptor, kind: SourceKind) -> CompiledStatement {
    let columns: Vec<String> = descriptor
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name.to_uppercase(), c.wire.render()))
        .collect();
    let text = format!(
        "CREATE {keyword} IF NOT EXISTS {name} ({columns}) WITH ({props});",
        keyword = source_keyword(kind),
        name = descriptor.name,
        columns = columns.join(", "),
        props = with_properties(descriptor),
    );
    CompiledStatement::new(statement_kind(kind), text)
}

/// Properties for a source derived from a pipeline.
///
/// Every field is optional; only present fields render into the `WITH`
/// clause, and an all-empty value omits the clause entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedOptions {
    /// Backing topic name override.
    pub topic: Option<String>,
    /// Partition count override.
    pub partitions: Option<u32>,
    /// Replication factor override.
    pub replication: Option<u16>,
    /// Value serialization format override.
    pub value_format: Option<ValueFormat>,
}

impl DerivedOptions {
    fn render(&self) -> Option<String> {
        let mut props = Vec::new();
        if let Some(topic) = &self.topic {
            props.push(format!("KAFKA_TOPIC='{topic}'"));
        }
        if let Some(format) = self.value_format {
            props.push(format!("VALUE_FORMAT='{}'", format.as_str()));
        }
        if let Some(partitions) = self.partitions {
            props.push(format!("PARTITIONS={partitions}"));
        }
        if let Some(replication) = self.replication {
            props.push(format!("REPLICAS={replication}"));
        }
        if props.is_empty() {
            return None;
        }
        Some(format!(" WITH ({})", props.join(", ")))
    }
}

/// Render `CREATE STREAM|TABLE IF NOT EXISTS name … AS SELECT …` from a
/// pipeline.
///
/// # Errors
///
/// Propagates pipeline compilation failures.
pub fn create_source_as(
    name: &str,
    kind: SourceKind,
    node: &QueryNode,
    options: &DerivedOptions,
) -> Result<CompiledStatement, QueryError> {
    let body = select_body(node)?;
    let with = options.render().unwrap_or_default();
    let text = format!(
        "CREATE {keyword} IF NOT EXISTS {name}{with} AS {body} EMIT CHANGES;",
        keyword = source_keyword(kind),
    );
    Ok(CompiledStatement::new(statement_kind(kind), text))
}

/// Render `INSERT INTO name (columns) VALUES (…);`.
///
/// Columns keep their declared casing; literal values render with the
/// same quoting rules as predicates.
#[must_use]
pub fn insert(source: &str, columns: &[String], values: &[Literal]) -> CompiledStatement {
    let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
    let text = format!(
        "INSERT INTO {source} ({}) VALUES ({});",
        columns.join(", "),
        rendered.join(", "),
    );
    CompiledStatement::new(StatementKind::Insert, text)
}

/// Render `DROP STREAM|TABLE IF EXISTS name;`, optionally deleting the
/// backing topic.
#[must_use]
pub fn drop_source(name: &str, kind: SourceKind, delete_topic: bool) -> CompiledStatement {
    let suffix = if delete_topic { " DELETE TOPIC" } else { "" };
    let text = format!(
        "DROP {keyword} IF EXISTS {name}{suffix};",
        keyword = source_keyword(kind),
    );
    CompiledStatement::new(StatementKind::Drop, text)
}
