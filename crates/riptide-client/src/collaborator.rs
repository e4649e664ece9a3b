//! Execution collaborator seam.
//!
//! The context never talks to an engine directly; everything crosses
//! [`ExecutionClient`]. Statement submission, push-query rows, topic
//! writes, and topic subscriptions each have one method, so a test can
//! script the whole surface with channels.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

use riptide_sql::CompiledStatement;

/// Errors from statement submission and query execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The engine rejected the statement.
    #[error("statement rejected: {0}")]
    Rejected(String),

    /// The engine connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The query was cancelled before completion.
    #[error("query cancelled")]
    Cancelled,
}

/// Errors from topic writes.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The broker rejected the record.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The broker connection failed.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Offset of an acknowledged topic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset(pub i64);

/// One push-query result row, keyed by output column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values as the codec's intermediate representation.
    pub columns: serde_json::Map<String, serde_json::Value>,
}

/// One raw record from a topic subscription.
///
/// A `None` value is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Wire key.
    pub key: String,
    /// Value bytes; `None` for tombstones.
    pub value: Option<Vec<u8>>,
    /// Broker-assigned timestamp, epoch milliseconds.
    pub timestamp: i64,
}

/// Stream of push-query rows.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row, ExecutionError>> + Send>>;

/// Shared cancellation state for one feed.
///
/// The notify carries a stored permit, so a cancel that lands before
/// the consumer parks still wakes the next wait.
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelState {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::debug!("record feed cancelled");
        }
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A cancelable feed of raw topic records.
///
/// Cancellation is idempotent and wakes a consumer parked on an idle
/// channel; records already buffered when it lands are dropped, not
/// delivered.
pub struct RecordFeed {
    receiver: mpsc::Receiver<RawRecord>,
    state: Arc<CancelState>,
}

impl RecordFeed {
    /// Wrap a channel of raw records.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<RawRecord>) -> Self {
        Self {
            receiver,
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// A token that cancels this feed from elsewhere.
    #[must_use]
    pub fn cancellation(&self) -> FeedCancellation {
        FeedCancellation {
            state: Arc::clone(&self.state),
        }
    }

    /// Cancel the feed. Safe to call more than once.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Whether the feed has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Receive the next record.
    ///
    /// Returns `None` once the feed is cancelled or the producer side
    /// closes. A cancel that arrives while the consumer is parked wakes
    /// it immediately.
    pub async fn next(&mut self) -> Option<RawRecord> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.state.notify.notified() => None,
            record = self.receiver.recv() => {
                if self.is_cancelled() {
                    return None;
                }
                record
            }
        }
    }

    /// Convert into a [`Stream`] of raw records.
    ///
    /// The cancellation flag is dropped with the feed; use
    /// [`RecordFeed::cancellation`] first if external cancellation is
    /// still needed.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<RawRecord> {
        ReceiverStream::new(self.receiver)
    }
}

/// Cancels a [`RecordFeed`] without holding the feed itself.
#[derive(Clone)]
pub struct FeedCancellation {
    state: Arc<CancelState>,
}

impl FeedCancellation {
    /// Cancel the feed. Safe to call more than once.
    pub fn cancel(&self) {
        self.state.cancel();
    }
}

/// The engine- and broker-facing surface the context depends on.
///
/// Implementations translate to a concrete wire protocol; the client
/// crates never assume one.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Submit a DDL or DML statement and wait for acknowledgement.
    async fn submit_statement(&self, statement: &CompiledStatement) -> Result<(), ExecutionError>;

    /// Execute a push query, returning its unbounded row stream.
    async fn execute_query(&self, statement: &CompiledStatement)
        -> Result<RowStream, ExecutionError>;

    /// Create a topic if it does not already exist.
    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication: u16,
    ) -> Result<(), ExecutionError>;

    /// Write one record to a topic. A `None` value writes a tombstone.
    async fn write(
        &self,
        topic: &str,
        key: String,
        value: Option<Vec<u8>>,
    ) -> Result<Offset, WriteError>;

    /// Subscribe to a topic's raw records.
    async fn subscribe(&self, topic: &str) -> Result<RecordFeed, ExecutionError>;
}
