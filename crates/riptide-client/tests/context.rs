//! End-to-end context tests against a scripted execution collaborator.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use riptide_client::{
    ClientError, DeserializationPolicy, ExecutionClient, ExecutionError, Lineage, Offset,
    RawRecord, RecordFeed, RiptideContext, RowStream, WriteError,
};
use riptide_core::changes::ChangeType;
use riptide_core::query::field;
use riptide_derive::Record;
use riptide_sql::{CompiledStatement, DerivedOptions, StatementKind};

#[derive(Record, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[topic(name = "orders")]
struct Order {
    #[key]
    #[column("OrderId")]
    order_id: String,
    #[decimal(precision = 18, scale = 2)]
    #[column("Amount")]
    amount: f64,
}

#[derive(Record, Serialize, Deserialize, Clone, Debug, PartialEq)]
struct Click {
    page: String,
}

#[derive(Default)]
struct MockClient {
    statements: Mutex<Vec<CompiledStatement>>,
    topics: Mutex<Vec<(String, u32, u16)>>,
    writes: Mutex<Vec<(String, String, Option<Vec<u8>>)>>,
    feeds: Mutex<Vec<mpsc::Sender<RawRecord>>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MockClient {
    fn statement_texts(&self) -> Vec<String> {
        self.statements.lock().iter().map(|s| s.text.clone()).collect()
    }

    fn fail_writes_for(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }
}

#[async_trait]
impl ExecutionClient for MockClient {
    async fn submit_statement(&self, statement: &CompiledStatement) -> Result<(), ExecutionError> {
        self.statements.lock().push(statement.clone());
        Ok(())
    }

    async fn execute_query(
        &self,
        statement: &CompiledStatement,
    ) -> Result<RowStream, ExecutionError> {
        self.statements.lock().push(statement.clone());
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication: u16,
    ) -> Result<(), ExecutionError> {
        self.topics
            .lock()
            .push((name.to_string(), partitions, replication));
        Ok(())
    }

    async fn write(
        &self,
        topic: &str,
        key: String,
        value: Option<Vec<u8>>,
    ) -> Result<Offset, WriteError> {
        if self.failing_keys.lock().contains(&key) {
            return Err(WriteError::Rejected(format!("key '{key}' refused")));
        }
        let mut writes = self.writes.lock();
        writes.push((topic.to_string(), key, value));
        Ok(Offset(writes.len() as i64 - 1))
    }

    async fn subscribe(&self, _topic: &str) -> Result<RecordFeed, ExecutionError> {
        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().push(tx);
        Ok(RecordFeed::new(rx))
    }
}

fn context_with(client: Arc<MockClient>) -> RiptideContext {
    RiptideContext::builder()
        .execution_client(client)
        .build()
        .unwrap()
}

#[tokio::test]
async fn ensure_stream_resubmits_the_identical_statement() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));

    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();
    assert_eq!(stream.name(), "orders");

    let texts = client.statement_texts();
    assert_eq!(texts.len(), 1);
    assert_eq!(
        texts[0],
        "CREATE STREAM IF NOT EXISTS orders \
         (ORDERID VARCHAR, AMOUNT DECIMAL(18,2)) \
         WITH (KAFKA_TOPIC='orders', VALUE_FORMAT='JSON', PARTITIONS=1, REPLICAS=1, \
         KEY='OrderId');"
    );
    assert_eq!(
        client.topics.lock().clone(),
        vec![("orders".to_string(), 1, 1)]
    );

    // Every call submits the same IF NOT EXISTS statement and never
    // errors; the engine treats the repeat as a no-op.
    ctx.ensure_stream_created::<Order>().await.unwrap();
    let texts = client.statement_texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], texts[1]);
    assert_eq!(ctx.catalog().names(), vec!["orders"]);
}

#[tokio::test]
async fn keyless_type_cannot_back_a_table() {
    let ctx = context_with(Arc::new(MockClient::default()));
    let err = ctx.ensure_table_created::<Click>().await.err().unwrap();
    assert!(matches!(err, ClientError::TableRequiresKey(name) if name == "Click"));
}

#[tokio::test]
async fn produce_uses_composite_key() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    stream
        .produce(&Order {
            order_id: "ord-1".into(),
            amount: 12.5,
        })
        .await
        .unwrap();

    let writes = client.writes.lock();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "orders");
    assert_eq!(writes[0].1, "ord-1");
    let value: serde_json::Value =
        serde_json::from_slice(writes[0].2.as_deref().unwrap()).unwrap();
    assert_eq!(value["order_id"], "ord-1");
}

#[tokio::test]
async fn explicit_keys_override_derivation() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    stream
        .produce_with_key(
            "region-eu",
            &Order {
                order_id: "ord-1".into(),
                amount: 12.5,
            },
        )
        .await
        .unwrap();

    assert_eq!(client.writes.lock()[0].1, "region-eu");
}

#[tokio::test]
async fn keyless_records_get_generated_keys() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Click>().await.unwrap();

    stream.produce(&Click { page: "/a".into() }).await.unwrap();
    stream.produce(&Click { page: "/b".into() }).await.unwrap();

    let writes = client.writes.lock();
    assert_eq!(writes[0].1, "Click-1");
    assert_eq!(writes[1].1, "Click-2");
}

#[tokio::test]
async fn produce_batch_reports_per_item_results() {
    let client = Arc::new(MockClient::default());
    client.fail_writes_for("ord-2");
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    let batch = vec![
        Order {
            order_id: "ord-1".into(),
            amount: 1.0,
        },
        Order {
            order_id: "ord-2".into(),
            amount: 2.0,
        },
        Order {
            order_id: "ord-3".into(),
            amount: 3.0,
        },
    ];
    let results = stream.produce_batch(&batch).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ClientError::Write(_))));
    // A failed item does not stop the rest of the batch.
    assert!(results[2].is_ok());
    assert_eq!(client.writes.lock().len(), 2);
}

#[tokio::test]
async fn insert_goes_through_the_engine() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    stream
        .insert(&Order {
            order_id: "ord-9".into(),
            amount: 42.5,
        })
        .await
        .unwrap();

    let statements = client.statements.lock();
    let insert = statements.last().unwrap();
    assert_eq!(insert.kind, StatementKind::Insert);
    assert_eq!(
        insert.text,
        "INSERT INTO orders (OrderId, Amount) VALUES ('ord-9', 42.5);"
    );
}

#[tokio::test]
async fn table_save_flushes_in_order_with_tombstones() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let table = ctx.ensure_table_created::<Order>().await.unwrap();

    let first = Order {
        order_id: "ord-1".into(),
        amount: 1.0,
    };
    let second = Order {
        order_id: "ord-2".into(),
        amount: 2.0,
    };
    table.add(&first).unwrap();
    table.add(&second).unwrap();
    table.remove(&first).unwrap();
    assert_eq!(table.pending_len(), 3);

    let offsets = table.save().await.unwrap();
    assert_eq!(offsets.len(), 3);
    assert_eq!(table.pending_len(), 0);

    let writes = client.writes.lock();
    assert_eq!(writes[0].1, "ord-1");
    assert!(writes[0].2.is_some());
    assert_eq!(writes[1].1, "ord-2");
    // The removal is a tombstone.
    assert_eq!(writes[2].1, "ord-1");
    assert!(writes[2].2.is_none());
}

#[tokio::test]
async fn failed_save_keeps_unwritten_mutations_buffered() {
    let client = Arc::new(MockClient::default());
    client.fail_writes_for("ord-2");
    let ctx = context_with(Arc::clone(&client));
    let table = ctx.ensure_table_created::<Order>().await.unwrap();

    table
        .add(&Order {
            order_id: "ord-1".into(),
            amount: 1.0,
        })
        .unwrap();
    table
        .add(&Order {
            order_id: "ord-2".into(),
            amount: 2.0,
        })
        .unwrap();
    table
        .add(&Order {
            order_id: "ord-3".into(),
            amount: 3.0,
        })
        .unwrap();

    let err = table.save().await.unwrap_err();
    assert!(matches!(err, ClientError::Write(_)));
    // ord-1 went out; ord-2 and ord-3 stay buffered.
    assert_eq!(client.writes.lock().len(), 1);
    assert_eq!(table.pending_len(), 2);
}

#[tokio::test]
async fn derived_stream_rejects_writes() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    ctx.ensure_stream_created::<Order>().await.unwrap();

    let pipeline = riptide_core::query::QueryBuilder::stream("orders")
        .filter(field("Amount").gt(100))
        .unwrap();
    let derived = ctx
        .derive_stream::<Order>("big_orders", &pipeline, &DerivedOptions::default())
        .await
        .unwrap();

    assert_eq!(derived.lineage(), Lineage::Derived);
    let err = derived
        .produce(&Order {
            order_id: "ord-1".into(),
            amount: 500.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedOperation(_)));

    let texts = client.statement_texts();
    assert_eq!(
        texts.last().unwrap(),
        "CREATE STREAM IF NOT EXISTS big_orders AS \
         SELECT * FROM orders WHERE Amount > 100 EMIT CHANGES;"
    );
}

#[tokio::test]
async fn derive_table_requires_table_shaped_pipeline() {
    let ctx = context_with(Arc::new(MockClient::default()));
    let pipeline = riptide_core::query::QueryBuilder::stream("orders")
        .filter(field("Amount").gt(100))
        .unwrap();
    let err = ctx
        .derive_table::<Order>("totals", &pipeline, &DerivedOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::Query(_)));
}

#[tokio::test]
async fn push_query_compiles_and_executes() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));

    let pipeline = riptide_core::query::QueryBuilder::stream("orders")
        .filter(field("Amount").gt(100))
        .unwrap();
    let _rows = ctx.query(&pipeline).await.unwrap();

    assert_eq!(
        client.statement_texts(),
        vec!["SELECT * FROM orders WHERE Amount > 100 EMIT CHANGES;"]
    );
}

#[tokio::test]
async fn drop_stream_unregisters_and_submits_drop() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    ctx.ensure_stream_created::<Order>().await.unwrap();

    ctx.drop_stream("orders", true).await.unwrap();
    assert!(ctx.catalog().is_empty());
    assert_eq!(
        client.statement_texts().last().unwrap(),
        "DROP STREAM IF EXISTS orders DELETE TOPIC;"
    );
    assert!(ctx.stream::<Order>().is_err());
}

#[tokio::test]
async fn disposed_context_refuses_everything() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    ctx.dispose();
    ctx.dispose(); // idempotent
    assert!(ctx.is_disposed());

    assert!(matches!(
        ctx.ensure_stream_created::<Order>().await.err().unwrap(),
        ClientError::ObjectDisposed
    ));
    assert!(matches!(
        stream
            .produce(&Order {
                order_id: "ord-1".into(),
                amount: 1.0,
            })
            .await
            .unwrap_err(),
        ClientError::ObjectDisposed
    ));
}

#[tokio::test]
async fn disposed_handle_refuses_writes_but_context_survives() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    stream.dispose();
    stream.dispose();
    assert!(stream.is_disposed());
    assert!(matches!(
        stream
            .produce(&Order {
                order_id: "ord-1".into(),
                amount: 1.0,
            })
            .await
            .unwrap_err(),
        ClientError::ObjectDisposed
    ));

    // A fresh handle from the same context still works.
    let again = ctx.stream::<Order>().unwrap();
    again
        .produce(&Order {
            order_id: "ord-1".into(),
            amount: 1.0,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn stream_subscription_delivers_typed_records() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    let mut feed = stream.subscribe().await.unwrap();
    let tx = client.feeds.lock()[0].clone();
    tx.send(RawRecord {
        key: "ord-1".into(),
        value: Some(br#"{"order_id":"ord-1","amount":5.0}"#.to_vec()),
        timestamp: 1,
    })
    .await
    .unwrap();
    drop(tx);
    client.feeds.lock().clear();

    let order = feed.next().await.unwrap().unwrap();
    assert_eq!(order.order_id, "ord-1");
    assert!(feed.next().await.is_none());
}

#[tokio::test]
async fn table_change_feed_maps_tombstones_to_deletes() {
    let client = Arc::new(MockClient::default());
    let ctx = context_with(Arc::clone(&client));
    let table = ctx.ensure_table_created::<Order>().await.unwrap();

    let mut feed = table.observe_changes().await.unwrap();
    let tx = client.feeds.lock()[0].clone();
    tx.send(RawRecord {
        key: "ord-1".into(),
        value: Some(br#"{"order_id":"ord-1","amount":5.0}"#.to_vec()),
        timestamp: 1,
    })
    .await
    .unwrap();
    tx.send(RawRecord {
        key: "ord-1".into(),
        value: None,
        timestamp: 2,
    })
    .await
    .unwrap();
    drop(tx);
    client.feeds.lock().clear();

    let insert = feed.next().await.unwrap().unwrap();
    assert_eq!(insert.change_type, ChangeType::Insert);

    let delete = feed.next().await.unwrap().unwrap();
    assert_eq!(delete.change_type, ChangeType::Delete);
    assert_eq!(
        delete.previous,
        Some(Order {
            order_id: "ord-1".into(),
            amount: 5.0,
        })
    );
    assert!(feed.next().await.is_none());
}

#[tokio::test]
async fn dead_letter_policy_is_wired_through_the_context() {
    let client = Arc::new(MockClient::default());
    let ctx = RiptideContext::builder()
        .execution_client(Arc::clone(&client) as Arc<dyn ExecutionClient>)
        .deserialization_policy(DeserializationPolicy::DeadLetter {
            topic: "orders_dlq".into(),
        })
        .build()
        .unwrap();
    let stream = ctx.ensure_stream_created::<Order>().await.unwrap();

    let mut feed = stream.subscribe().await.unwrap();
    let tx = client.feeds.lock()[0].clone();
    tx.send(RawRecord {
        key: "bad".into(),
        value: Some(b"{broken".to_vec()),
        timestamp: 1,
    })
    .await
    .unwrap();
    drop(tx);
    client.feeds.lock().clear();

    assert!(feed.next().await.is_none());
    let writes = client.writes.lock();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "orders_dlq");
    assert_eq!(writes[0].1, "bad");
}
