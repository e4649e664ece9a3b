//! Typed feeds over raw topic subscriptions.

use std::marker::PhantomData;
use std::sync::Arc;

use fxhash::FxHashMap;
use serde::de::DeserializeOwned;

use riptide_core::changes::{to_notification, ChangeNotification};

use crate::codec::{from_value, ValueCodec};
use crate::collaborator::{ExecutionClient, FeedCancellation, RawRecord, RecordFeed};
use crate::config::DeserializationPolicy;
use crate::error::ClientError;

/// Shared plumbing for typed feeds.
struct FeedInner {
    feed: RecordFeed,
    codec: Arc<dyn ValueCodec>,
    policy: DeserializationPolicy,
    client: Arc<dyn ExecutionClient>,
    source: String,
    finished: bool,
}

impl FeedInner {
    async fn next_raw(&mut self) -> Option<RawRecord> {
        if self.finished {
            return None;
        }
        self.feed.next().await
    }

    /// Decode a record's value, applying the deserialization policy.
    ///
    /// `Ok(None)` means the record was skipped and the caller should
    /// move on to the next one.
    async fn decode<T: DeserializeOwned>(
        &mut self,
        record: &RawRecord,
        bytes: &[u8],
    ) -> Result<Option<T>, ClientError> {
        let decoded = self
            .codec
            .decode(bytes)
            .and_then(|value| from_value::<T>(value));
        match decoded {
            Ok(value) => Ok(Some(value)),
            Err(err) => match &self.policy {
                DeserializationPolicy::Abort => {
                    self.finished = true;
                    Err(err.into())
                }
                DeserializationPolicy::Skip => {
                    tracing::warn!(
                        source = %self.source,
                        key = %record.key,
                        error = %err,
                        "skipping undecodable record"
                    );
                    Ok(None)
                }
                DeserializationPolicy::DeadLetter { topic } => {
                    tracing::warn!(
                        source = %self.source,
                        key = %record.key,
                        dead_letter = %topic,
                        error = %err,
                        "forwarding undecodable record"
                    );
                    if let Err(write_err) = self
                        .client
                        .write(topic, record.key.clone(), record.value.clone())
                        .await
                    {
                        tracing::warn!(
                            dead_letter = %topic,
                            error = %write_err,
                            "dead-letter forward failed; record dropped"
                        );
                    }
                    Ok(None)
                }
            },
        }
    }
}

/// Typed feed of stream records.
///
/// Tombstones carry no meaning on a stream and are skipped.
pub struct TypedFeed<T> {
    inner: FeedInner,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedFeed<T> {
    pub(crate) fn new(
        feed: RecordFeed,
        codec: Arc<dyn ValueCodec>,
        policy: DeserializationPolicy,
        client: Arc<dyn ExecutionClient>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            inner: FeedInner {
                feed,
                codec,
                policy,
                client,
                source: source.into(),
                finished: false,
            },
            _marker: PhantomData,
        }
    }

    /// Receive the next decoded record.
    ///
    /// Returns `None` once the feed is cancelled, exhausted, or aborted
    /// by the deserialization policy.
    pub async fn next(&mut self) -> Option<Result<T, ClientError>> {
        loop {
            let record = self.inner.next_raw().await?;
            let Some(bytes) = record.value.as_deref() else {
                continue;
            };
            match self.inner.decode::<T>(&record, bytes).await {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }

    /// A token that cancels this feed from elsewhere.
    #[must_use]
    pub fn cancellation(&self) -> FeedCancellation {
        self.inner.feed.cancellation()
    }

    /// Cancel the feed. Safe to call more than once.
    pub fn cancel(&self) {
        self.inner.feed.cancel();
    }
}

/// Feed of change notifications over a table's topic.
///
/// Keeps the last-seen value per key so that updates carry their
/// previous value and tombstones resolve to deletes.
pub struct ChangeFeed<T> {
    inner: FeedInner,
    last_seen: FxHashMap<String, T>,
}

impl<T: DeserializeOwned + Clone> ChangeFeed<T> {
    pub(crate) fn new(
        feed: RecordFeed,
        codec: Arc<dyn ValueCodec>,
        policy: DeserializationPolicy,
        client: Arc<dyn ExecutionClient>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            inner: FeedInner {
                feed,
                codec,
                policy,
                client,
                source: source.into(),
                finished: false,
            },
            last_seen: FxHashMap::default(),
        }
    }

    /// Receive the next change notification.
    ///
    /// Returns `None` once the feed is cancelled, exhausted, or aborted
    /// by the deserialization policy.
    pub async fn next(&mut self) -> Option<Result<ChangeNotification<T>, ClientError>> {
        loop {
            let record = self.inner.next_raw().await?;
            match record.value.as_deref() {
                None => {
                    let previous = self.last_seen.remove(&record.key);
                    return Some(Ok(to_notification(
                        record.key,
                        None,
                        previous,
                        record.timestamp,
                    )));
                }
                Some(bytes) => match self.inner.decode::<T>(&record, bytes).await {
                    Ok(Some(value)) => {
                        let previous = self.last_seen.insert(record.key.clone(), value.clone());
                        return Some(Ok(to_notification(
                            record.key,
                            Some(value),
                            previous,
                            record.timestamp,
                        )));
                    }
                    Ok(None) => continue,
                    Err(err) => return Some(Err(err)),
                },
            }
        }
    }

    /// A token that cancels this feed from elsewhere.
    #[must_use]
    pub fn cancellation(&self) -> FeedCancellation {
        self.inner.feed.cancellation()
    }

    /// Cancel the feed. Safe to call more than once.
    pub fn cancel(&self) {
        self.inner.feed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::collaborator::{ExecutionError, Offset, RowStream, WriteError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use riptide_core::changes::ChangeType;
    use riptide_sql::CompiledStatement;
    use serde::Deserialize;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Reading {
        v: i64,
    }

    /// Collaborator stub that only records dead-letter writes.
    #[derive(Default)]
    struct SinkClient {
        written: Mutex<Vec<(String, String, Option<Vec<u8>>)>>,
    }

    #[async_trait]
    impl ExecutionClient for SinkClient {
        async fn submit_statement(
            &self,
            _statement: &CompiledStatement,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        async fn execute_query(
            &self,
            _statement: &CompiledStatement,
        ) -> Result<RowStream, ExecutionError> {
            Err(ExecutionError::Rejected("not scripted".into()))
        }

        async fn create_topic(
            &self,
            _name: &str,
            _partitions: u32,
            _replication: u16,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        async fn write(
            &self,
            topic: &str,
            key: String,
            value: Option<Vec<u8>>,
        ) -> Result<Offset, WriteError> {
            let mut written = self.written.lock();
            written.push((topic.to_string(), key, value));
            Ok(Offset(written.len() as i64 - 1))
        }

        async fn subscribe(&self, _topic: &str) -> Result<RecordFeed, ExecutionError> {
            Err(ExecutionError::Rejected("not scripted".into()))
        }
    }

    fn raw(key: &str, value: Option<&str>, timestamp: i64) -> RawRecord {
        RawRecord {
            key: key.into(),
            value: value.map(|v| v.as_bytes().to_vec()),
            timestamp,
        }
    }

    fn typed_feed(
        policy: DeserializationPolicy,
        client: Arc<SinkClient>,
    ) -> (mpsc::Sender<RawRecord>, TypedFeed<Reading>) {
        let (tx, rx) = mpsc::channel(8);
        let feed = TypedFeed::new(
            RecordFeed::new(rx),
            Arc::new(JsonCodec),
            policy,
            client,
            "readings",
        );
        (tx, feed)
    }

    #[tokio::test]
    async fn stream_feed_skips_tombstones() {
        let (tx, mut feed) = typed_feed(
            DeserializationPolicy::Abort,
            Arc::new(SinkClient::default()),
        );
        tx.send(raw("a", None, 1)).await.unwrap();
        tx.send(raw("a", Some(r#"{"v":7}"#), 2)).await.unwrap();
        drop(tx);

        assert_eq!(feed.next().await.unwrap().unwrap(), Reading { v: 7 });
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn abort_policy_ends_the_feed() {
        let (tx, mut feed) = typed_feed(
            DeserializationPolicy::Abort,
            Arc::new(SinkClient::default()),
        );
        tx.send(raw("a", Some("{broken"), 1)).await.unwrap();
        tx.send(raw("a", Some(r#"{"v":7}"#), 2)).await.unwrap();

        assert!(feed.next().await.unwrap().is_err());
        // The feed is finished; the valid record behind it is not
        // delivered.
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn skip_policy_moves_past_bad_records() {
        let (tx, mut feed) = typed_feed(
            DeserializationPolicy::Skip,
            Arc::new(SinkClient::default()),
        );
        tx.send(raw("a", Some("{broken"), 1)).await.unwrap();
        tx.send(raw("a", Some(r#"{"v":7}"#), 2)).await.unwrap();
        drop(tx);

        assert_eq!(feed.next().await.unwrap().unwrap(), Reading { v: 7 });
    }

    #[tokio::test]
    async fn dead_letter_policy_forwards_raw_record() {
        let client = Arc::new(SinkClient::default());
        let (tx, mut feed) = typed_feed(
            DeserializationPolicy::DeadLetter {
                topic: "readings_dlq".into(),
            },
            Arc::clone(&client),
        );
        tx.send(raw("bad-key", Some("{broken"), 1)).await.unwrap();
        tx.send(raw("a", Some(r#"{"v":7}"#), 2)).await.unwrap();
        drop(tx);

        assert_eq!(feed.next().await.unwrap().unwrap(), Reading { v: 7 });
        let written = client.written.lock();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "readings_dlq");
        assert_eq!(written[0].1, "bad-key");
        assert_eq!(written[0].2.as_deref(), Some("{broken".as_bytes()));
    }

    #[tokio::test]
    async fn change_feed_tracks_previous_values() {
        let (tx, rx) = mpsc::channel(8);
        let mut feed: ChangeFeed<Reading> = ChangeFeed::new(
            RecordFeed::new(rx),
            Arc::new(JsonCodec),
            DeserializationPolicy::Abort,
            Arc::new(SinkClient::default()),
            "readings",
        );
        tx.send(raw("a", Some(r#"{"v":1}"#), 1)).await.unwrap();
        tx.send(raw("a", Some(r#"{"v":2}"#), 2)).await.unwrap();
        tx.send(raw("a", None, 3)).await.unwrap();
        drop(tx);

        let insert = feed.next().await.unwrap().unwrap();
        assert_eq!(insert.change_type, ChangeType::Insert);
        assert!(insert.previous.is_none());

        let update = feed.next().await.unwrap().unwrap();
        assert_eq!(update.change_type, ChangeType::Update);
        assert_eq!(update.previous, Some(Reading { v: 1 }));

        let delete = feed.next().await.unwrap().unwrap();
        assert_eq!(delete.change_type, ChangeType::Delete);
        assert_eq!(delete.previous, Some(Reading { v: 2 }));
        assert!(delete.value.is_none());

        assert!(feed.next().await.is_none());
    }
}
