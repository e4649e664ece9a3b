//! Record type metadata extraction.
//!
//! A [`Record`] implementation (usually produced by `#[derive(Record)]`)
//! exposes declarative per-field metadata: key role and order, timestamp
//! role and format, numeric precision, and topic hints. [`extract`] reads
//! that table into a normalized [`RecordTypeMetadata`], validating it once
//! and caching the result for the process lifetime.

use std::any::TypeId;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

use crate::error::SchemaError;
use crate::schema::FieldType;

/// Key role of a field, with an order used to resolve composite keys.
///
/// Orders need not be unique; ties are broken by declaration position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyRole {
    /// Declared key order, ascending. Defaults to 0.
    pub order: u32,
}

/// Whether a timestamp column reflects event time or processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    /// The time the event occurred, carried in the record.
    EventTime,
    /// The time the engine observed the record.
    ProcessingTime,
}

/// Timestamp role of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampRole {
    /// Event-time or processing-time semantics.
    pub kind: TimestampKind,
    /// Optional parse format for text timestamp columns.
    pub format: Option<String>,
}

/// One field of a record type, as declared.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Rust field name.
    pub name: String,
    /// Column name used on the wire (defaults to the field name).
    pub column: String,
    /// Semantic field type.
    pub ty: FieldType,
    /// Whether the column admits nulls.
    pub nullable: bool,
    /// Key role, if the field participates in the record key.
    pub key: Option<KeyRole>,
    /// Timestamp role, if the field is the record's time column.
    pub timestamp: Option<TimestampRole>,
}

impl FieldSpec {
    /// A plain value field with no role annotations.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            ty,
            nullable: false,
            key: None,
            timestamp: None,
        }
    }

    /// Override the wire column name.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark the field nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the field as a key field with the given order.
    #[must_use]
    pub fn key(mut self, order: u32) -> Self {
        self.key = Some(KeyRole { order });
        self
    }

    /// Mark the field as the event-time column.
    #[must_use]
    pub fn event_time(mut self, format: Option<String>) -> Self {
        self.timestamp = Some(TimestampRole {
            kind: TimestampKind::EventTime,
            format,
        });
        self
    }

    /// Mark the field as the processing-time column.
    #[must_use]
    pub fn processing_time(mut self) -> Self {
        self.timestamp = Some(TimestampRole {
            kind: TimestampKind::ProcessingTime,
            format: None,
        });
        self
    }
}

/// Topic-level hints declared on the record type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicHints {
    /// Topic name. Defaults to the snake_cased type name.
    pub name: Option<String>,
    /// Partition count override.
    pub partitions: Option<u32>,
    /// Replication factor override.
    pub replication: Option<u16>,
}

/// A key field resolved into composite-key position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    /// Column name of the key field.
    pub column: String,
    /// Declared order.
    pub order: u32,
}

/// The record's timestamp column, resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampField {
    /// Column name.
    pub column: String,
    /// Event-time or processing-time semantics.
    pub kind: TimestampKind,
    /// Optional parse format.
    pub format: Option<String>,
}

/// Normalized metadata for one record type.
///
/// Computed once per type on first use and cached for the process
/// lifetime; a pure function of the type definition, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTypeMetadata {
    /// Record type name.
    pub type_name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldSpec>,
    /// Key fields sorted by declared order, declaration position as
    /// tie-break.
    pub key_fields: Vec<KeyField>,
    /// The timestamp column, if one is declared.
    pub timestamp: Option<TimestampField>,
    /// Topic-level hints.
    pub hints: TopicHints,
}

impl RecordTypeMetadata {
    /// Validate and normalize a declared field table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Configuration`] if more than one timestamp
    /// field is declared. Key and timestamp roles live on the fields
    /// themselves, so a role can never point at a missing column.
    pub fn from_fields(
        type_name: impl Into<String>,
        fields: Vec<FieldSpec>,
        hints: TopicHints,
    ) -> Result<Self, SchemaError> {
        let type_name = type_name.into();

        let mut timestamp = None;
        for field in &fields {
            if let Some(role) = &field.timestamp {
                if timestamp.is_some() {
                    return Err(SchemaError::Configuration(format!(
                        "type '{type_name}' declares more than one timestamp field"
                    )));
                }
                timestamp = Some(TimestampField {
                    column: field.column.clone(),
                    kind: role.kind,
                    format: role.format.clone(),
                });
            }
        }

        // Stable sort keeps declaration position as the tie-break for
        // equal orders, which makes composite keys deterministic.
        let mut key_fields: Vec<KeyField> = fields
            .iter()
            .filter_map(|f| {
                f.key.map(|role| KeyField {
                    column: f.column.clone(),
                    order: role.order,
                })
            })
            .collect();
        key_fields.sort_by_key(|k| k.order);

        Ok(Self {
            type_name,
            fields,
            key_fields,
            timestamp,
            hints,
        })
    }

    /// Column names of the key fields, in resolved key order.
    #[must_use]
    pub fn key_columns(&self) -> Vec<String> {
        self.key_fields.iter().map(|k| k.column.clone()).collect()
    }

    /// Whether the type declares at least one key field.
    #[must_use]
    pub fn has_key(&self) -> bool {
        !self.key_fields.is_empty()
    }

    /// Topic name: the declared hint, or the snake_cased type name.
    #[must_use]
    pub fn topic_name(&self) -> String {
        self.hints
            .name
            .clone()
            .unwrap_or_else(|| snake_case(&self.type_name))
    }
}

/// A record type bound to a topic.
///
/// Usually implemented via `#[derive(Record)]`; the derive reads field
/// attributes into the [`FieldSpec`] table and emits `key_parts` in
/// resolved key order.
pub trait Record: Send + Sized + 'static {
    /// The record type's name.
    fn type_name() -> &'static str;

    /// Declared fields, in declaration order.
    fn fields() -> Vec<FieldSpec>;

    /// Topic-level hints.
    fn topic_hints() -> TopicHints {
        TopicHints::default()
    }

    /// Stringified key field values, already in resolved key order
    /// (declared order ascending, declaration position as tie-break).
    /// Empty for types with no key fields.
    fn key_parts(&self) -> Vec<String>;
}

/// Extract normalized metadata for `T`, cached per process.
///
/// Pure and deterministic; safe to call concurrently. Cache entries are
/// append-only and never updated in place.
///
/// # Errors
///
/// Returns [`SchemaError::Configuration`] for ambiguous declarative
/// metadata (e.g. two timestamp fields).
pub fn extract<T: Record>() -> Result<Arc<RecordTypeMetadata>, SchemaError> {
    static CACHE: RwLock<Option<FxHashMap<TypeId, Arc<RecordTypeMetadata>>>> = RwLock::new(None);

    let id = TypeId::of::<T>();
    if let Some(cache) = CACHE.read().as_ref() {
        if let Some(meta) = cache.get(&id) {
            return Ok(Arc::clone(meta));
        }
    }

    let meta = Arc::new(RecordTypeMetadata::from_fields(
        T::type_name(),
        T::fields(),
        T::topic_hints(),
    )?);
    tracing::debug!(type_name = T::type_name(), "extracted record type metadata");

    let mut guard = CACHE.write();
    let cache = guard.get_or_insert_with(FxHashMap::default);
    // A racing extractor may have inserted first; both computed the same
    // pure value, so keep whichever is already present.
    let entry = cache.entry(id).or_insert_with(|| Arc::clone(&meta));
    Ok(Arc::clone(entry))
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    impl Record for Order {
        fn type_name() -> &'static str {
            "Order"
        }

        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("region", FieldType::Text).key(1),
                FieldSpec::new("order_id", FieldType::Text).key(0),
                FieldSpec::new("amount", FieldType::Float64),
                FieldSpec::new("ts", FieldType::Timestamp).event_time(None),
            ]
        }

        fn key_parts(&self) -> Vec<String> {
            vec!["ord-1".into(), "eu".into()]
        }
    }

    #[test]
    fn key_fields_sorted_by_order() {
        let meta = extract::<Order>().unwrap();
        assert_eq!(meta.key_columns(), vec!["order_id", "region"]);
    }

    #[test]
    fn extraction_is_cached() {
        let a = extract::<Order>().unwrap();
        let b = extract::<Order>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let fields = vec![
            FieldSpec::new("a", FieldType::Timestamp).event_time(None),
            FieldSpec::new("b", FieldType::Timestamp).processing_time(),
        ];
        let err = RecordTypeMetadata::from_fields("Bad", fields, TopicHints::default())
            .unwrap_err();
        assert!(matches!(err, SchemaError::Configuration(_)));
    }

    #[test]
    fn equal_orders_keep_declaration_position() {
        let fields = vec![
            FieldSpec::new("b", FieldType::Text).key(0),
            FieldSpec::new("a", FieldType::Text).key(0),
        ];
        let meta =
            RecordTypeMetadata::from_fields("Pair", fields, TopicHints::default()).unwrap();
        assert_eq!(meta.key_columns(), vec!["b", "a"]);
    }

    #[test]
    fn topic_name_defaults_to_snake_case() {
        let meta = RecordTypeMetadata::from_fields(
            "OrderLineItem",
            vec![FieldSpec::new("id", FieldType::Int64)],
            TopicHints::default(),
        )
        .unwrap();
        assert_eq!(meta.topic_name(), "order_line_item");
        assert!(!meta.has_key());
    }

    #[test]
    fn topic_name_hint_wins() {
        let hints = TopicHints {
            name: Some("orders_v2".into()),
            ..TopicHints::default()
        };
        let meta = RecordTypeMetadata::from_fields(
            "Order",
            vec![FieldSpec::new("id", FieldType::Int64)],
            hints,
        )
        .unwrap();
        assert_eq!(meta.topic_name(), "orders_v2");
    }
}
