//! Derive macros for Riptide.
//!
//! Provides `#[derive(Record)]` to eliminate boilerplate when binding
//! struct types to topics.
//!
//! # Example
//!
//! ```rust,ignore
//! use riptide_derive::Record;
//!
//! #[derive(Record)]
//! #[topic(name = "orders", partitions = 3)]
//! struct Order {
//!     #[key]
//!     order_id: String,
//!     #[decimal(precision = 18, scale = 2)]
//!     amount: f64,
//!     #[event_time]
//!     created: std::time::SystemTime,
//! }
//! ```

extern crate proc_macro;

use proc_macro::TokenStream;

use syn::{parse_macro_input, DeriveInput};

mod record;

/// Derive the `Record` trait for a struct.
///
/// Generates `type_name()`, the declarative `fields()` table,
/// `topic_hints()`, and `key_parts()` in resolved key order.
///
/// Field types map through `ToFieldType`; implement that trait by hand
/// for enums and value objects. `Option<T>` fields map to the nullable
/// variant of `T`.
///
/// # Attributes
///
/// - `#[key]` / `#[key(2)]` — key field, with optional composite order
/// - `#[event_time]` / `#[event_time("yyyy-MM-dd")]` — event-time column,
///   with optional parse format for text timestamps
/// - `#[processing_time]` — processing-time column
/// - `#[decimal(precision = 18, scale = 2)]` — fixed-point override for
///   a numeric field
/// - `#[column("Name")]` — overrides the wire column name
/// - `#[nullable]` — marks a non-Option field as nullable
/// - `#[topic(name = "…", partitions = n, replicas = n)]` — struct-level
///   topic hints
#[proc_macro_derive(
    Record,
    attributes(key, event_time, processing_time, decimal, column, nullable, topic)
)]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand_record(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
