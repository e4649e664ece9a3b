//! Basic stream example: derive a record type, create its stream, and
//! read produced records back over a typed feed.
//!
//! Uses an in-process loopback collaborator so the example runs without
//! an engine.
//!
//! ```bash
//! cargo run --example basic_stream
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use riptide::prelude::*;
use riptide::{ExecutionError, Offset, RawRecord, RecordFeed, RowStream, WriteError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Record, Serialize, Deserialize, Clone, Debug)]
#[topic(name = "trades", partitions = 3)]
struct Trade {
    #[key]
    symbol: String,
    price: f64,
    volume: i64,
}

/// In-process broker: writes loop back to subscribers of the topic.
#[derive(Default)]
struct LoopbackClient {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<RawRecord>>>>,
    offsets: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl ExecutionClient for LoopbackClient {
    async fn submit_statement(&self, statement: &CompiledStatement) -> Result<(), ExecutionError> {
        println!("[engine] {statement}");
        Ok(())
    }

    async fn execute_query(
        &self,
        statement: &CompiledStatement,
    ) -> Result<RowStream, ExecutionError> {
        println!("[engine] {statement}");
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        _replication: u16,
    ) -> Result<(), ExecutionError> {
        println!("[broker] topic '{name}' with {partitions} partitions");
        Ok(())
    }

    async fn write(
        &self,
        topic: &str,
        key: String,
        value: Option<Vec<u8>>,
    ) -> Result<Offset, WriteError> {
        let offset = {
            let mut offsets = self.offsets.lock();
            let next = offsets.entry(topic.to_string()).or_insert(0);
            *next += 1;
            *next - 1
        };
        let record = RawRecord {
            key,
            value,
            timestamp: offset,
        };
        let senders = self
            .subscribers
            .lock()
            .get(topic)
            .cloned()
            .unwrap_or_default();
        for sender in senders {
            let _ = sender.send(record.clone()).await;
        }
        Ok(Offset(offset))
    }

    async fn subscribe(&self, topic: &str) -> Result<RecordFeed, ExecutionError> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(RecordFeed::new(rx))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = RiptideContext::builder()
        .execution_client(Arc::new(LoopbackClient::default()))
        .build()?;

    let trades = ctx.ensure_stream_created::<Trade>().await?;
    println!("Created stream '{}'", trades.name());

    let mut feed = trades.subscribe().await?;

    trades
        .produce(&Trade {
            symbol: "AAPL".into(),
            price: 175.50,
            volume: 1000,
        })
        .await?;
    trades
        .produce(&Trade {
            symbol: "GOOG".into(),
            price: 142.30,
            volume: 500,
        })
        .await?;

    for _ in 0..2 {
        if let Some(trade) = feed.next().await {
            let trade = trade?;
            println!("  {} @ {} x{}", trade.symbol, trade.price, trade.volume);
        }
    }
    feed.cancel();

    println!("\nRegistered sources:");
    for name in ctx.catalog().names() {
        println!("  - {name}");
    }

    ctx.dispose();
    println!("\nContext disposed.");
    Ok(())
}
