//! Typed table handles.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
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
use crate::subscription::ChangeFeed;

/// One buffered mutation: key plus value bytes, `None` for a tombstone.
type PendingWrite = (String, Option<Vec<u8>>);

/// Handle to one table.
///
/// Writing to a table is an upsert on the record's key; removal writes a
/// tombstone. Mutations can go straight out with [`TableHandle::produce`]
/// and [`TableHandle::remove_now`], or batch up through
/// [`TableHandle::add`] / [`TableHandle::remove`] until
/// [`TableHandle::save`] flushes them in order.
pub struct TableHandle<T> {
    inner: Arc<ContextInner>,
    name: String,
    meta: Option<Arc<RecordTypeMetadata>>,
    descriptor: Option<Arc<TopicDescriptor>>,
    lineage: Lineage,
    disposed: AtomicBool,
    pending: Mutex<Vec<PendingWrite>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TableHandle<T> {
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
            pending: Mutex::new(Vec::new()),
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
            pending: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic descriptor; absent for derived tables.
    #[must_use]
    pub fn descriptor(&self) -> Option<&TopicDescriptor> {
        self.descriptor.as_deref()
    }

    /// Primary or derived lineage.
    #[must_use]
    pub fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// Number of buffered mutations awaiting [`TableHandle::save`].
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Start a pipeline reading from this table.
    #[must_use]
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::table(&self.name)
    }

    /// Dispose the handle. Idempotent; buffered mutations are dropped.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            let dropped = self.pending.lock().drain(..).count();
            if dropped > 0 {
                tracing::warn!(
                    table = %self.name,
                    dropped,
                    "disposed with unsaved mutations"
                );
            }
        }
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
                "table '{}' is derived from a pipeline and read-only",
                self.name
            )));
        }
        self.meta
            .as_deref()
            .ok_or(ClientError::ObjectDisposed)
    }
}

impl<T: Record + Serialize> TableHandle<T> {
    /// Upsert one record immediately.
    ///
    /// # Errors
    ///
    /// Write or serialization failures, [`ClientError::ObjectDisposed`],
    /// or [`ClientError::UnsupportedOperation`] on derived tables.
    pub async fn produce(&self, record: &T) -> Result<Offset, ClientError> {
        self.check_writable()?;
        let key = composite_key_string(record)?;
        let bytes = self.inner.codec.encode(&to_value(record)?)?;
        Ok(self
            .inner
            .client
            .write(&self.name, key, Some(bytes))
            .await?)
    }

    /// Delete one record's key immediately by writing a tombstone.
    ///
    /// # Errors
    ///
    /// Same failures as [`TableHandle::produce`].
    pub async fn remove_now(&self, record: &T) -> Result<Offset, ClientError> {
        self.check_writable()?;
        let key = composite_key_string(record)?;
        Ok(self.inner.client.write(&self.name, key, None).await?)
    }

    /// Buffer an upsert for the next [`TableHandle::save`].
    ///
    /// Serialization happens here, so a bad record fails at `add` rather
    /// than poisoning the flush.
    ///
    /// # Errors
    ///
    /// Serialization failures or the usual handle-state errors.
    pub fn add(&self, record: &T) -> Result<(), ClientError> {
        self.check_writable()?;
        let key = composite_key_string(record)?;
        let bytes = self.inner.codec.encode(&to_value(record)?)?;
        self.pending.lock().push((key, Some(bytes)));
        Ok(())
    }

    /// Buffer a tombstone for the next [`TableHandle::save`].
    ///
    /// # Errors
    ///
    /// Key derivation failures or the usual handle-state errors.
    pub fn remove(&self, record: &T) -> Result<(), ClientError> {
        self.check_writable()?;
        let key = composite_key_string(record)?;
        self.pending.lock().push((key, None));
        Ok(())
    }

    /// Flush buffered mutations in the order they were added.
    ///
    /// On a write failure the failed mutation and everything behind it
    /// stay buffered; mutations already written stay written.
    ///
    /// # Errors
    ///
    /// The first write failure, or the usual handle-state errors.
    pub async fn save(&self) -> Result<Vec<Offset>, ClientError> {
        self.check_writable()?;
        let drained: Vec<PendingWrite> = self.pending.lock().drain(..).collect();
        let mut offsets = Vec::with_capacity(drained.len());
        for (index, (key, value)) in drained.iter().enumerate() {
            match self
                .inner
                .client
                .write(&self.name, key.clone(), value.clone())
                .await
            {
                Ok(offset) => offsets.push(offset),
                Err(err) => {
                    let mut pending = self.pending.lock();
                    let mut remaining: Vec<PendingWrite> = drained[index..].to_vec();
                    remaining.append(&mut pending);
                    *pending = remaining;
                    return Err(err.into());
                }
            }
        }
        Ok(offsets)
    }

    /// Insert one record through an `INSERT INTO` statement.
    ///
    /// # Errors
    ///
    /// Same failures as [`TableHandle::produce`].
    pub async fn insert(&self, record: &T) -> Result<(), ClientError> {
        let meta = self.check_writable()?;
        let statement = insert_statement_for(&self.name, meta, record)?;
        Ok(self.inner.client.submit_statement(&statement).await?)
    }
}

impl<T: DeserializeOwned + Clone> TableHandle<T> {
    /// Observe the table's changes as insert/update/delete notifications.
    ///
    /// # Errors
    ///
    /// Collaborator failures or [`ClientError::ObjectDisposed`].
    pub async fn observe_changes(&self) -> Result<ChangeFeed<T>, ClientError> {
        self.check()?;
        let feed = self.inner.client.subscribe(&self.name).await?;
        Ok(ChangeFeed::new(
            feed,
            Arc::clone(&self.inner.codec),
            self.inner.config.deserialization.clone(),
            Arc::clone(&self.inner.client),
            self.name.clone(),
        ))
    }
}
