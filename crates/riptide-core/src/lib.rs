//! # Riptide core
//!
//! Shared value model for the Riptide client library: record type
//! metadata, schema descriptors, the declarative query representation,
//! and the change/tombstone notification model.
//!
//! Everything in this crate is a pure value or a pure function over
//! values. Descriptor extraction, schema rendering, and query building
//! have no shared mutable state beyond the append-only per-type metadata
//! cache, and are safe to call concurrently.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod error;
pub mod metadata;
pub mod query;
pub mod schema;

pub use changes::{to_notification, ChangeNotification, ChangeType};
pub use error::{QueryError, SchemaError};
pub use metadata::{
    extract, FieldSpec, KeyField, KeyRole, Record, RecordTypeMetadata, TimestampField,
    TimestampKind, TimestampRole, TopicHints,
};
pub use schema::{
    composite_key_string, map_wire_type, render_column_schema, Column, ContextDefaults,
    FieldType, ToFieldType, TopicDescriptor, ValueFormat, WireType, KEY_SEPARATOR,
};
