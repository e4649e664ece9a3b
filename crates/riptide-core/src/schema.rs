//! Schema descriptor model.
//!
//! Maps each field's semantic [`FieldType`] to a [`WireType`] understood
//! by the query engine, renders ordered column schemas, and derives the
//! per-topic [`TopicDescriptor`] that creation statements are built from.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime};

use crate::error::SchemaError;
use crate::metadata::{extract, Record, RecordTypeMetadata};

/// Default decimal precision when no `#[decimal]` annotation is present.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 38;
/// Default decimal scale when no `#[decimal]` annotation is present.
pub const DEFAULT_DECIMAL_SCALE: u8 = 9;

/// Separator joining composite key parts into one wire key.
///
/// Key field values must not contain this character; the convention does
/// not escape it.
pub const KEY_SEPARATOR: char = '|';

/// Semantic type of a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Boolean.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Fixed-point numeric with declared precision and scale.
    Decimal {
        /// Total digits.
        precision: u8,
        /// Fractional digits.
        scale: u8,
    },
    /// Text.
    Text,
    /// An instant / date-time.
    Timestamp,
    /// A duration / time-of-day.
    Duration,
    /// A unique identifier, carried as text on the wire.
    UniqueId,
    /// Ordered list of elements.
    Array(Box<FieldType>),
    /// Keyed map. Only text keys have a wire representation.
    Map {
        /// Key type; must map to text.
        key: Box<FieldType>,
        /// Value type.
        value: Box<FieldType>,
    },
    /// Closed set of named variants.
    Enum {
        /// Enum type name.
        name: String,
        /// Variant names.
        variants: Vec<String>,
    },
    /// Nested composite type with its own field list.
    Struct {
        /// Composite type name, used for cycle detection.
        name: String,
        /// Nested fields in declaration order.
        fields: Vec<(String, FieldType)>,
    },
    /// Anything else: treated as opaque text, independently serialized.
    Opaque,
}

/// Wire type accepted by the query engine.
#[derive(Debug, Clone, PartialEq)]
pub enum WireType {
    /// BOOLEAN.
    Boolean,
    /// SMALLINT.
    SmallInt,
    /// INTEGER.
    Integer,
    /// BIGINT.
    BigInt,
    /// REAL.
    Real,
    /// DOUBLE.
    Double,
    /// DECIMAL(precision, scale).
    Decimal {
        /// Total digits.
        precision: u8,
        /// Fractional digits.
        scale: u8,
    },
    /// VARCHAR.
    Varchar,
    /// TIMESTAMP.
    Timestamp,
    /// TIME.
    Time,
    /// ARRAY of an element wire type.
    Array(Box<WireType>),
    /// MAP with VARCHAR keys.
    Map(Box<WireType>),
    /// Enumerated representation. Renders as VARCHAR in DDL; the variant
    /// list is retained for codecs.
    Enum(Vec<String>),
    /// Nested STRUCT schema.
    Struct(Vec<Column>),
}

impl WireType {
    /// Render the wire type in the engine's DDL grammar.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            WireType::Boolean => "BOOLEAN".into(),
            WireType::SmallInt => "SMALLINT".into(),
            WireType::Integer => "INTEGER".into(),
            WireType::BigInt => "BIGINT".into(),
            WireType::Real => "REAL".into(),
            WireType::Double => "DOUBLE".into(),
            WireType::Decimal { precision, scale } => {
                format!("DECIMAL({precision},{scale})")
            }
            WireType::Varchar | WireType::Enum(_) => "VARCHAR".into(),
            WireType::Timestamp => "TIMESTAMP".into(),
            WireType::Time => "TIME".into(),
            WireType::Array(elem) => format!("ARRAY<{}>", elem.render()),
            WireType::Map(value) => format!("MAP<VARCHAR, {}>", value.render()),
            WireType::Struct(columns) => {
                let inner: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} {}", c.name.to_uppercase(), c.wire.render()))
                    .collect();
                format!("STRUCT<{}>", inner.join(", "))
            }
        }
    }
}

/// One rendered column: name plus wire type.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name as declared.
    pub name: String,
    /// Wire type.
    pub wire: WireType,
}

/// Map a semantic field type to its wire type.
///
/// The mapping is a closed precedence table: every input either returns
/// a defined wire type or raises an error — named rules never silently
/// default. Only [`FieldType::Opaque`] takes the permissive VARCHAR
/// fallback.
///
/// # Errors
///
/// [`SchemaError::UnsupportedType`] for maps with non-text keys;
/// [`SchemaError::SchemaCycle`] if a composite type recursively contains
/// itself.
pub fn map_wire_type(ty: &FieldType) -> Result<WireType, SchemaError> {
    let mut visiting = Vec::new();
    map_wire_type_inner(ty, &mut visiting)
}

fn map_wire_type_inner(
    ty: &FieldType,
    visiting: &mut Vec<String>,
) -> Result<WireType, SchemaError> {
    match ty {
        FieldType::Bool => Ok(WireType::Boolean),
        FieldType::Int8 | FieldType::Int16 => Ok(WireType::SmallInt),
        FieldType::Int32 => Ok(WireType::Integer),
        FieldType::Int64 => Ok(WireType::BigInt),
        FieldType::Float32 => Ok(WireType::Real),
        FieldType::Float64 => Ok(WireType::Double),
        FieldType::Decimal { precision, scale } => Ok(WireType::Decimal {
            precision: *precision,
            scale: *scale,
        }),
        FieldType::Text => Ok(WireType::Varchar),
        FieldType::Timestamp => Ok(WireType::Timestamp),
        FieldType::Duration => Ok(WireType::Time),
        FieldType::UniqueId => Ok(WireType::Varchar),
        FieldType::Array(elem) => Ok(WireType::Array(Box::new(map_wire_type_inner(
            elem, visiting,
        )?))),
        FieldType::Map { key, value } => {
            if !matches!(key.as_ref(), FieldType::Text | FieldType::UniqueId) {
                return Err(SchemaError::UnsupportedType(format!(
                    "map keys must be text, got {key:?}"
                )));
            }
            Ok(WireType::Map(Box::new(map_wire_type_inner(
                value, visiting,
            )?)))
        }
        FieldType::Enum { variants, .. } => Ok(WireType::Enum(variants.clone())),
        FieldType::Struct { name, fields } => {
            if visiting.iter().any(|n| n == name) {
                return Err(SchemaError::SchemaCycle(name.clone()));
            }
            visiting.push(name.clone());
            let mut columns = Vec::with_capacity(fields.len());
            for (field_name, field_ty) in fields {
                columns.push(Column {
                    name: field_name.clone(),
                    wire: map_wire_type_inner(field_ty, visiting)?,
                });
            }
            visiting.pop();
            Ok(WireType::Struct(columns))
        }
        FieldType::Opaque => Ok(WireType::Varchar),
    }
}

/// Render the ordered column schema for a record type.
///
/// # Errors
///
/// Propagates [`map_wire_type`] failures.
pub fn render_column_schema(meta: &RecordTypeMetadata) -> Result<Vec<Column>, SchemaError> {
    meta.fields
        .iter()
        .map(|f| {
            Ok(Column {
                name: f.column.clone(),
                wire: map_wire_type(&f.ty)?,
            })
        })
        .collect()
}

/// Serialization format of topic values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    /// Avro with schema-registry integration.
    Avro,
    /// JSON.
    #[default]
    Json,
    /// Protobuf.
    Protobuf,
    /// Delimited text.
    Csv,
}

impl ValueFormat {
    /// The format name used in `WITH (VALUE_FORMAT='…')`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueFormat::Avro => "AVRO",
            ValueFormat::Json => "JSON",
            ValueFormat::Protobuf => "PROTOBUF",
            ValueFormat::Csv => "DELIMITED",
        }
    }
}

/// Context-level defaults applied where the record type declares no hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDefaults {
    /// Default partition count.
    pub partitions: u32,
    /// Default replication factor.
    pub replication: u16,
    /// Default value serialization format.
    pub value_format: ValueFormat,
}

impl Default for ContextDefaults {
    fn default() -> Self {
        Self {
            partitions: 1,
            replication: 1,
            value_format: ValueFormat::Json,
        }
    }
}

/// Descriptor of one topic-bound source, derived 1:1 from record
/// metadata plus context defaults.
///
/// Immutable once built; the `with_*` methods rebuild a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicDescriptor {
    /// Topic name.
    pub name: String,
    /// Ordered key column list; empty for keyless types.
    pub key_columns: Vec<String>,
    /// Timestamp column, if declared.
    pub timestamp_column: Option<String>,
    /// Timestamp parse format, if declared.
    pub timestamp_format: Option<String>,
    /// Value serialization format.
    pub value_format: ValueFormat,
    /// Partition count.
    pub partitions: u32,
    /// Replication factor.
    pub replication: u16,
    /// Rendered column schema in declaration order.
    pub columns: Vec<Column>,
}

impl TopicDescriptor {
    /// Build a descriptor from normalized metadata and context defaults.
    ///
    /// # Errors
    ///
    /// Propagates schema rendering failures.
    pub fn from_metadata(
        meta: &RecordTypeMetadata,
        defaults: &ContextDefaults,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            name: meta.topic_name(),
            key_columns: meta.key_columns(),
            timestamp_column: meta.timestamp.as_ref().map(|t| t.column.clone()),
            timestamp_format: meta.timestamp.as_ref().and_then(|t| t.format.clone()),
            value_format: defaults.value_format,
            partitions: meta.hints.partitions.unwrap_or(defaults.partitions),
            replication: meta.hints.replication.unwrap_or(defaults.replication),
            columns: render_column_schema(meta)?,
        })
    }

    /// Build the descriptor for a record type using [`extract`].
    ///
    /// # Errors
    ///
    /// Propagates extraction and schema rendering failures.
    pub fn for_record<T: Record>(defaults: &ContextDefaults) -> Result<Self, SchemaError> {
        Self::from_metadata(extract::<T>()?.as_ref(), defaults)
    }

    /// Rebuild with a different topic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Rebuild with a different partition count.
    #[must_use]
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Rebuild with a different value format.
    #[must_use]
    pub fn with_value_format(mut self, format: ValueFormat) -> Self {
        self.value_format = format;
        self
    }

    /// Whether the descriptor may back a table (requires key columns).
    #[must_use]
    pub fn supports_table(&self) -> bool {
        !self.key_columns.is_empty()
    }
}

/// Build the composite wire key for a record.
///
/// A single key field returns its stringified value; multiple key fields
/// join with [`KEY_SEPARATOR`] in resolved key order.
///
/// # Errors
///
/// [`SchemaError::MissingKey`] if the type declares no key fields.
pub fn composite_key_string<T: Record>(record: &T) -> Result<String, SchemaError> {
    let meta = extract::<T>()?;
    if !meta.has_key() {
        return Err(SchemaError::MissingKey(meta.type_name.clone()));
    }
    let parts = record.key_parts();
    Ok(parts.join(&KEY_SEPARATOR.to_string()))
}

/// Conversion from a Rust type to its semantic [`FieldType`].
///
/// Implemented for the primitive and standard-library types the derive
/// macro accepts; implement it by hand for enums and value objects.
/// Unsigned integers map one size up; `u64` maps to [`FieldType::Int64`]
/// and values above `i64::MAX` are out of range on the wire.
pub trait ToFieldType {
    /// The semantic field type of `Self`.
    fn field_type() -> FieldType;
}

macro_rules! impl_to_field_type {
    ($($ty:ty => $ft:expr),* $(,)?) => {
        $(impl ToFieldType for $ty {
            fn field_type() -> FieldType {
                $ft
            }
        })*
    };
}

impl_to_field_type! {
    bool => FieldType::Bool,
    i8 => FieldType::Int8,
    i16 => FieldType::Int16,
    i32 => FieldType::Int32,
    i64 => FieldType::Int64,
    u8 => FieldType::Int16,
    u16 => FieldType::Int32,
    u32 => FieldType::Int64,
    u64 => FieldType::Int64,
    f32 => FieldType::Float32,
    f64 => FieldType::Float64,
    String => FieldType::Text,
    SystemTime => FieldType::Timestamp,
    Duration => FieldType::Duration,
}

impl<T: ToFieldType> ToFieldType for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
}

impl<T: ToFieldType> ToFieldType for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Array(Box::new(T::field_type()))
    }
}

impl<K: ToFieldType, V: ToFieldType, S> ToFieldType for HashMap<K, V, S> {
    fn field_type() -> FieldType {
        FieldType::Map {
            key: Box::new(K::field_type()),
            value: Box::new(V::field_type()),
        }
    }
}

impl<K: ToFieldType, V: ToFieldType> ToFieldType for BTreeMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::Map {
            key: Box::new(K::field_type()),
            value: Box::new(V::field_type()),
        }
    }
}
