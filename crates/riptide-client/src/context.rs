//! The client context: source creation, handles, and push queries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use riptide_core::metadata::{extract, Record, RecordTypeMetadata};
use riptide_core::query::{Literal, QueryBuilder, SourceKind};
use riptide_core::schema::{ContextDefaults, TopicDescriptor, ValueFormat};
use riptide_sql::{create_source, create_source_as, drop_source, CompiledStatement, DerivedOptions};

use crate::catalog::{Catalog, CatalogEntry, Lineage};
use crate::codec::{to_value, CodecError, JsonCodec, ValueCodec};
use crate::collaborator::{ExecutionClient, RowStream};
use crate::config::{DeserializationPolicy, RetryPolicy, RiptideConfig};
use crate::error::ClientError;
use crate::stream::StreamHandle;
use crate::table::TableHandle;

/// Shared state behind the context and every handle it creates.
pub(crate) struct ContextInner {
    pub(crate) client: Arc<dyn ExecutionClient>,
    pub(crate) codec: Arc<dyn ValueCodec>,
    pub(crate) config: RiptideConfig,
    pub(crate) catalog: Catalog,
    pub(crate) disposed: AtomicBool,
}

impl ContextInner {
    pub(crate) fn check_live(&self) -> Result<(), ClientError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ClientError::ObjectDisposed);
        }
        Ok(())
    }
}

/// Build the `INSERT` statement for one record.
///
/// Columns follow field declaration order under their wire names; null
/// values are omitted rather than written as literals.
pub(crate) fn insert_statement_for<T: Record + Serialize>(
    source: &str,
    meta: &RecordTypeMetadata,
    record: &T,
) -> Result<CompiledStatement, ClientError> {
    let value = to_value(record)?;
    let serde_json::Value::Object(map) = value else {
        return Err(CodecError(format!(
            "record type '{}' does not serialize to an object",
            meta.type_name
        ))
        .into());
    };

    let mut columns = Vec::new();
    let mut literals = Vec::new();
    for field in &meta.fields {
        match map.get(&field.name) {
            None | Some(serde_json::Value::Null) => {}
            Some(value) => {
                columns.push(field.column.clone());
                literals.push(json_literal(value));
            }
        }
    }
    Ok(riptide_sql::insert(source, &columns, &literals))
}

fn json_literal(value: &serde_json::Value) -> Literal {
    match value {
        serde_json::Value::Bool(b) => Literal::Bool(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| Literal::Float(n.as_f64().unwrap_or_default()), Literal::Int),
        serde_json::Value::String(s) => Literal::Text(s.clone()),
        // Compound values travel as their serialized text.
        other => Literal::Text(other.to_string()),
    }
}

/// Entry point for the typed client.
///
/// The context owns the catalog of sources it has created. `ensure_*`
/// methods are idempotent: every call submits the identical
/// `IF NOT EXISTS` statement, which the engine answers cheaply, and the
/// catalog records the source for later handle lookup. Creation is
/// therefore safe to repeat within and across processes.
pub struct RiptideContext {
    inner: Arc<ContextInner>,
}

impl RiptideContext {
    /// Start building a context.
    #[must_use]
    pub fn builder() -> RiptideContextBuilder {
        RiptideContextBuilder::default()
    }

    /// Context configuration.
    #[must_use]
    pub fn config(&self) -> &RiptideConfig {
        &self.inner.config
    }

    /// The catalog of sources this context knows about.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Create the backing topic for a record type if needed.
    ///
    /// # Errors
    ///
    /// Schema derivation or collaborator failures.
    pub async fn ensure_topic_created<T: Record>(&self) -> Result<(), ClientError> {
        self.inner.check_live()?;
        let descriptor = TopicDescriptor::for_record::<T>(&self.inner.config.defaults)?;
        self.inner
            .client
            .create_topic(&descriptor.name, descriptor.partitions, descriptor.replication)
            .await?;
        Ok(())
    }

    /// Ensure a stream for `T` exists and return its handle.
    ///
    /// # Errors
    ///
    /// Schema derivation failures, collaborator failures, or a catalog
    /// conflict if the name is already registered as a table.
    pub async fn ensure_stream_created<T: Record>(
        &self,
    ) -> Result<StreamHandle<T>, ClientError> {
        let (meta, descriptor) = self
            .ensure_source_created::<T>(SourceKind::Stream)
            .await?;
        Ok(StreamHandle::primary(
            Arc::clone(&self.inner),
            meta,
            descriptor,
        ))
    }

    /// Ensure a table for `T` exists and return its handle.
    ///
    /// # Errors
    ///
    /// [`ClientError::TableRequiresKey`] for keyless record types, plus
    /// everything [`RiptideContext::ensure_stream_created`] can raise.
    pub async fn ensure_table_created<T: Record>(&self) -> Result<TableHandle<T>, ClientError> {
        let (meta, descriptor) = self.ensure_source_created::<T>(SourceKind::Table).await?;
        Ok(TableHandle::primary(
            Arc::clone(&self.inner),
            meta,
            descriptor,
        ))
    }

    async fn ensure_source_created<T: Record>(
        &self,
        kind: SourceKind,
    ) -> Result<(Arc<RecordTypeMetadata>, Arc<TopicDescriptor>), ClientError> {
        self.inner.check_live()?;
        let meta = extract::<T>()?;
        let descriptor = Arc::new(TopicDescriptor::from_metadata(
            &meta,
            &self.inner.config.defaults,
        )?);

        if kind == SourceKind::Table && !descriptor.supports_table() {
            return Err(ClientError::TableRequiresKey(meta.type_name.clone()));
        }

        if let Some(existing) = self.inner.catalog.get(&descriptor.name) {
            if existing.kind != kind {
                return Err(ClientError::Configuration(format!(
                    "source '{}' is already registered with different semantics",
                    descriptor.name
                )));
            }
        }

        // Repeated calls re-submit the identical statement; IF NOT
        // EXISTS makes it a no-op on the engine side.
        self.inner
            .client
            .create_topic(&descriptor.name, descriptor.partitions, descriptor.replication)
            .await?;
        let statement = create_source(&descriptor, kind);
        self.inner.client.submit_statement(&statement).await?;

        self.inner.catalog.register(CatalogEntry {
            name: descriptor.name.clone(),
            kind,
            lineage: Lineage::Primary,
            descriptor: Some(Arc::clone(&descriptor)),
        });
        tracing::info!(source = %descriptor.name, ?kind, "source created");
        Ok((meta, descriptor))
    }

    /// Handle for an already-created stream of `T`.
    ///
    /// # Errors
    ///
    /// [`ClientError::SourceNotFound`] if the stream was never ensured
    /// through this context.
    pub fn stream<T: Record>(&self) -> Result<StreamHandle<T>, ClientError> {
        self.inner.check_live()?;
        let meta = extract::<T>()?;
        let name = meta.topic_name();
        match self.inner.catalog.get(&name) {
            Some(entry) if entry.kind == SourceKind::Stream => {
                let descriptor = entry
                    .descriptor
                    .ok_or_else(|| ClientError::SourceNotFound(name.clone()))?;
                Ok(StreamHandle::primary(
                    Arc::clone(&self.inner),
                    meta,
                    descriptor,
                ))
            }
            _ => Err(ClientError::SourceNotFound(name)),
        }
    }

    /// Handle for an already-created table of `T`.
    ///
    /// # Errors
    ///
    /// [`ClientError::SourceNotFound`] if the table was never ensured
    /// through this context.
    pub fn table<T: Record>(&self) -> Result<TableHandle<T>, ClientError> {
        self.inner.check_live()?;
        let meta = extract::<T>()?;
        let name = meta.topic_name();
        match self.inner.catalog.get(&name) {
            Some(entry) if entry.kind == SourceKind::Table => {
                let descriptor = entry
                    .descriptor
                    .ok_or_else(|| ClientError::SourceNotFound(name.clone()))?;
                Ok(TableHandle::primary(
                    Arc::clone(&self.inner),
                    meta,
                    descriptor,
                ))
            }
            _ => Err(ClientError::SourceNotFound(name)),
        }
    }

    /// Create a stream derived from a pipeline.
    ///
    /// The returned handle can subscribe and compose queries but rejects
    /// writes; the engine owns the derived stream's content.
    ///
    /// # Errors
    ///
    /// Pipeline compilation failures, a shape error if the pipeline
    /// materializes a table, or collaborator failures.
    pub async fn derive_stream<T>(
        &self,
        name: &str,
        pipeline: &QueryBuilder,
        options: &DerivedOptions,
    ) -> Result<StreamHandle<T>, ClientError> {
        self.derive_source(name, SourceKind::Stream, pipeline, options)
            .await?;
        Ok(StreamHandle::derived(Arc::clone(&self.inner), name))
    }

    /// Create a table derived from a pipeline.
    ///
    /// # Errors
    ///
    /// Pipeline compilation failures, a shape error if the pipeline
    /// stays a stream, or collaborator failures.
    pub async fn derive_table<T>(
        &self,
        name: &str,
        pipeline: &QueryBuilder,
        options: &DerivedOptions,
    ) -> Result<TableHandle<T>, ClientError> {
        self.derive_source(name, SourceKind::Table, pipeline, options)
            .await?;
        Ok(TableHandle::derived(Arc::clone(&self.inner), name))
    }

    async fn derive_source(
        &self,
        name: &str,
        kind: SourceKind,
        pipeline: &QueryBuilder,
        options: &DerivedOptions,
    ) -> Result<(), ClientError> {
        self.inner.check_live()?;
        let node = pipeline.node();
        if node.output_kind() != kind {
            return Err(ClientError::Query(
                riptide_core::error::QueryError::InvalidShape(format!(
                    "pipeline output is a {:?}, cannot derive a {:?} from it",
                    node.output_kind(),
                    kind
                )),
            ));
        }

        if self.inner.catalog.contains(name) {
            return Ok(());
        }

        let statement = create_source_as(name, kind, &node, options)?;
        self.inner.client.submit_statement(&statement).await?;
        self.inner.catalog.register(CatalogEntry {
            name: name.to_string(),
            kind,
            lineage: Lineage::Derived,
            descriptor: None,
        });
        tracing::info!(source = %name, ?kind, "derived source created");
        Ok(())
    }

    /// Drop a stream, optionally deleting its backing topic.
    ///
    /// Safe to call for streams that no longer exist.
    ///
    /// # Errors
    ///
    /// Collaborator failures.
    pub async fn drop_stream(&self, name: &str, delete_topic: bool) -> Result<(), ClientError> {
        self.drop_sourced(name, SourceKind::Stream, delete_topic).await
    }

    /// Drop a table, optionally deleting its backing topic.
    ///
    /// Safe to call for tables that no longer exist.
    ///
    /// # Errors
    ///
    /// Collaborator failures.
    pub async fn drop_table(&self, name: &str, delete_topic: bool) -> Result<(), ClientError> {
        self.drop_sourced(name, SourceKind::Table, delete_topic).await
    }

    async fn drop_sourced(
        &self,
        name: &str,
        kind: SourceKind,
        delete_topic: bool,
    ) -> Result<(), ClientError> {
        self.inner.check_live()?;
        let statement = drop_source(name, kind, delete_topic);
        self.inner.client.submit_statement(&statement).await?;
        self.inner.catalog.remove(name);
        Ok(())
    }

    /// Compile and run a push query over a pipeline.
    ///
    /// # Errors
    ///
    /// Pipeline compilation failures or collaborator failures.
    pub async fn query(&self, pipeline: &QueryBuilder) -> Result<RowStream, ClientError> {
        self.inner.check_live()?;
        let statement = riptide_sql::compile_select(&pipeline.node())?;
        Ok(self.inner.client.execute_query(&statement).await?)
    }

    /// Dispose the context.
    ///
    /// Idempotent. Every later operation on this context or its handles
    /// fails with [`ClientError::ObjectDisposed`]; the catalog is
    /// cleared.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            self.inner.catalog.clear();
            tracing::info!("context disposed");
        }
    }

    /// Whether the context has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

/// Builder for [`RiptideContext`].
pub struct RiptideContextBuilder {
    client: Option<Arc<dyn ExecutionClient>>,
    codec: Arc<dyn ValueCodec>,
    config: RiptideConfig,
}

impl Default for RiptideContextBuilder {
    fn default() -> Self {
        Self {
            client: None,
            codec: Arc::new(JsonCodec),
            config: RiptideConfig::default(),
        }
    }
}

impl RiptideContextBuilder {
    /// Set the execution collaborator. Required.
    #[must_use]
    pub fn execution_client(mut self, client: Arc<dyn ExecutionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the value codec. Defaults to JSON.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Override every topic default at once.
    #[must_use]
    pub fn defaults(mut self, defaults: ContextDefaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Default partition count for created topics.
    #[must_use]
    pub fn default_partitions(mut self, partitions: u32) -> Self {
        self.config.defaults.partitions = partitions;
        self
    }

    /// Default value format for created sources.
    #[must_use]
    pub fn value_format(mut self, format: ValueFormat) -> Self {
        self.config.defaults.value_format = format;
        self
    }

    /// Decode-failure policy for typed feeds.
    #[must_use]
    pub fn deserialization_policy(mut self, policy: DeserializationPolicy) -> Self {
        self.config.deserialization = policy;
        self
    }

    /// Retry guidance passed to the collaborator.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// [`ClientError::Configuration`] if no execution client was set.
    pub fn build(self) -> Result<RiptideContext, ClientError> {
        let client = self.client.ok_or_else(|| {
            ClientError::Configuration("an execution client is required".into())
        })?;
        Ok(RiptideContext {
            inner: Arc::new(ContextInner {
                client,
                codec: self.codec,
                config: self.config,
                catalog: Catalog::default(),
                disposed: AtomicBool::new(false),
            }),
        })
    }
}
