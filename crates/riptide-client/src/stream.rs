//! Typed stream handles.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use riptide_core::metadata::{Record, RecordTypeMetadata};
use riptide_core::query::QueryBuilder;
use riptide_core::schema::{composite_key_string, TopicDescriptor};

use crate::catalog::Lineage;
use crate::codec::to_value;
use crate::collaborator::Offset;
use crate::context::{insert_statement_for, ContextInner};
use crate::error::ClientError;
use crate::subscription::TypedFeed;

/// Handle to one stream.
///
/// Primary streams accept writes; derived streams are read-only because
/// the engine populates them from their pipeline.
pub struct StreamHandle<T> {
    inner: Arc<ContextInner>,
    name: String,
    meta: Option<Arc<RecordTypeMetadata>>,
    descriptor: Option<Arc<TopicDescriptor>>,
    lineage: Lineage,
    disposed: AtomicBool,
    sequence: AtomicU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StreamHandle<T> {
    pub(crate) fn primary(
        inner: Arc<ContextInner>,
        meta: Arc<RecordTypeMetadata>,
        descriptor: Arc<TopicDescriptor>,
    ) -> Self {
        Self {
            inner,
            name: descriptor.name.clone(),
            meta: Some(meta),
            descriptor: Some(descriptor),
            lineage: Lineage::Primary,
            disposed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    pub(crate) fn derived(inner: Arc<ContextInner>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
            meta: None,
            descriptor: None,
            lineage: Lineage::Derived,
            disposed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    /// Stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic descriptor; absent for derived streams.
    #[must_use]
    pub fn descriptor(&self) -> Option<&TopicDescriptor> {
        self.descriptor.as_deref()
    }

    /// Primary or derived lineage.
    #[must_use]
    pub fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// Start a pipeline reading from this stream.
    #[must_use]
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::stream(&self.name)
    }

    /// Dispose the handle. Idempotent.
    pub fn dispose(&self) {
        self.disposed.swap(true, Ordering::AcqRel);
    }

    /// Whether this handle has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), ClientError> {
        self.inner.check_live()?;
        if self.is_disposed() {
            return Err(ClientError::ObjectDisposed);
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<&RecordTypeMetadata, ClientError> {
        self.check()?;
        if self.lineage == Lineage::Derived {
            return Err(ClientError::UnsupportedOperation(format!(
                "stream '{}' is derived from a pipeline and read-only",
                self.name
            )));
        }
        // Primary handles always carry metadata.
        self.meta
            .as_deref()
            .ok_or(ClientError::ObjectDisposed)
    }
}

impl<T: Record + Serialize> StreamHandle<T> {
    /// Produce one record to the stream's topic.
    ///
    /// Keyed types use the composite key; keyless types get a generated
    /// `{type_name}-{n}` key unique within this handle.
    ///
    /// # Errors
    ///
    /// Write or serialization failures, [`ClientError::ObjectDisposed`],
    /// or [`ClientError::UnsupportedOperation`] on derived streams.
    pub async fn produce(&self, record: &T) -> Result<Offset, ClientError> {
        let meta = self.check_writable()?;
        let key = self.record_key(record, meta)?;
        let bytes = self.inner.codec.encode(&to_value(record)?)?;
        Ok(self
            .inner
            .client
            .write(&self.name, key, Some(bytes))
            .await?)
    }

    /// Produce one record under an explicit key, bypassing key
    /// derivation.
    ///
    /// # Errors
    ///
    /// Same failures as [`StreamHandle::produce`].
    pub async fn produce_with_key(
        &self,
        key: impl Into<String>,
        record: &T,
    ) -> Result<Offset, ClientError> {
        self.check_writable()?;
        let bytes = self.inner.codec.encode(&to_value(record)?)?;
        Ok(self
            .inner
            .client
            .write(&self.name, key.into(), Some(bytes))
            .await?)
    }

    /// Produce a batch, one result per record.
    ///
    /// A failed record does not stop the rest of the batch; callers
    /// inspect the per-item results.
    pub async fn produce_batch(&self, records: &[T]) -> Vec<Result<Offset, ClientError>> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.produce(record).await);
        }
        results
    }

    /// Insert one record through an `INSERT INTO` statement.
    ///
    /// Unlike [`StreamHandle::produce`], the record travels through the
    /// engine rather than straight to the topic.
    ///
    /// # Errors
    ///
    /// Same failures as [`StreamHandle::produce`].
    pub async fn insert(&self, record: &T) -> Result<(), ClientError> {
        let meta = self.check_writable()?;
        let statement = insert_statement_for(&self.name, meta, record)?;
        Ok(self.inner.client.submit_statement(&statement).await?)
    }

    fn record_key(&self, record: &T, meta: &RecordTypeMetadata) -> Result<String, ClientError> {
        if meta.has_key() {
            return Ok(composite_key_string(record)?);
        }
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("{}-{n}", meta.type_name))
    }
}

impl<T: DeserializeOwned> StreamHandle<T> {
    /// Subscribe to the stream's records.
    ///
    /// # Errors
    ///
    /// Collaborator failures or [`ClientError::ObjectDisposed`].
    pub async fn subscribe(&self) -> Result<TypedFeed<T>, ClientError> {
        self.check()?;
        let feed = self.inner.client.subscribe(&self.name).await?;
        Ok(TypedFeed::new(
            feed,
            Arc::clone(&self.inner.codec),
            self.inner.config.deserialization.clone(),
            Arc::clone(&self.inner.client),
            self.name.clone(),
        ))
    }
}
