//! Typed client for streaming-SQL engines.
//!
//! A [`RiptideContext`] derives topic schemas from record types, creates
//! streams and tables idempotently, compiles pipelines into push
//! queries, and exposes typed feeds with tombstone-aware change
//! notifications. All engine and broker traffic crosses the
//! [`ExecutionClient`] seam.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod codec;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod error;
pub mod stream;
pub mod subscription;
pub mod table;

pub use catalog::{Catalog, CatalogEntry, Lineage};
pub use codec::{CodecError, JsonCodec, ValueCodec};
pub use collaborator::{
    ExecutionClient, ExecutionError, FeedCancellation, Offset, RawRecord, RecordFeed, Row,
    RowStream, WriteError,
};
pub use config::{DeserializationPolicy, RetryPolicy, RiptideConfig};
pub use context::{RiptideContext, RiptideContextBuilder};
pub use error::ClientError;
pub use stream::StreamHandle;
pub use subscription::{ChangeFeed, TypedFeed};
pub use table::TableHandle;
