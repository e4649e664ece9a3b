//! # Riptide
//!
//! A typed client for ksqlDB-style streaming-SQL engines.
//!
//! Riptide derives topic schemas from Rust record types, composes
//! queries as values, compiles them to the engine's query text, and
//! exposes typed feeds with stream/table duality: streams deliver every
//! record, tables deliver keyed change notifications where an absent
//! value is a delete.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use riptide::prelude::*;
//!
//! #[derive(Record, Serialize, Deserialize, Clone)]
//! #[topic(name = "orders", partitions = 3)]
//! struct Order {
//!     #[key]
//!     order_id: String,
//!     #[decimal(precision = 18, scale = 2)]
//!     amount: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = RiptideContext::builder()
//!         .execution_client(my_engine_client())
//!         .build()?;
//!
//!     let orders = ctx.ensure_stream_created::<Order>().await?;
//!     orders.produce(&Order {
//!         order_id: "ord-1".into(),
//!         amount: 175.50,
//!     }).await?;
//!
//!     let big = orders.query().filter(field("amount").gt(100))?;
//!     let mut rows = ctx.query(&big).await?;
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export the client facade
pub use riptide_client::*;

// Re-export derive macros
pub use riptide_derive::Record;

// Re-export the core value model
pub use riptide_core::{changes, error, metadata, query, schema};

// Re-export statement compilation
pub use riptide_sql as sql;

/// Commonly used types, traits, and macros.
///
/// ```rust,ignore
/// use riptide::prelude::*;
/// ```
pub mod prelude {
    // Context and handles
    pub use riptide_client::{
        ClientError, DeserializationPolicy, ExecutionClient, JsonCodec, Lineage, RiptideConfig,
        RiptideContext, StreamHandle, TableHandle, ValueCodec,
    };

    // Derive macros
    pub use riptide_derive::Record;

    // Query composition
    pub use riptide_core::query::{
        field, AggregateExpr, JoinKind, QueryBuilder, SourceKind, WindowSpec,
    };

    // Schema and change model
    pub use riptide_core::changes::{ChangeNotification, ChangeType};
    pub use riptide_core::metadata::Record as RecordTrait;
    pub use riptide_core::schema::{ContextDefaults, TopicDescriptor, ValueFormat};

    // Statement values
    pub use riptide_sql::{CompiledStatement, StatementKind};

    // Standard library re-exports for convenience
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
