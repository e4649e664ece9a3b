use riptide_core::metadata::{extract, Record, TimestampKind};
use riptide_core::schema::{composite_key_string, FieldType};
use riptide_derive::Record;

#[derive(Record)]
#[topic(name = "orders", partitions = 3)]
struct Order {
    #[key]
    #[column("OrderId")]
    order_id: String,
    #[decimal(precision = 18, scale = 2)]
    amount: f64,
    #[event_time]
    created: std::time::SystemTime,
    note: Option<String>,
}

#[derive(Record)]
struct Reading {
    #[key(1)]
    channel: i32,
    #[key(0)]
    device: String,
    value: f64,
}

#[derive(Record)]
struct Ping {
    #[processing_time]
    seen: std::time::SystemTime,
    payload: Vec<u8>,
}

#[test]
fn field_table_reflects_attributes() {
    let meta = extract::<Order>().unwrap();
    assert_eq!(meta.type_name, "Order");
    assert_eq!(meta.topic_name(), "orders");
    assert_eq!(meta.hints.partitions, Some(3));

    let order_id = &meta.fields[0];
    assert_eq!(order_id.name, "order_id");
    assert_eq!(order_id.column, "OrderId");
    assert!(order_id.key.is_some());

    let amount = &meta.fields[1];
    assert_eq!(
        amount.ty,
        FieldType::Decimal {
            precision: 18,
            scale: 2
        }
    );

    let note = &meta.fields[3];
    assert!(note.nullable);
    assert_eq!(note.ty, FieldType::Text);
}

#[test]
fn event_time_resolves() {
    let meta = extract::<Order>().unwrap();
    let ts = meta.timestamp.as_ref().unwrap();
    assert_eq!(ts.column, "created");
    assert_eq!(ts.kind, TimestampKind::EventTime);
    assert!(ts.format.is_none());
}

#[test]
fn processing_time_resolves() {
    let meta = extract::<Ping>().unwrap();
    let ts = meta.timestamp.as_ref().unwrap();
    assert_eq!(ts.kind, TimestampKind::ProcessingTime);
    assert!(!meta.has_key());
}

#[test]
fn key_parts_follow_declared_order_not_declaration_position() {
    let meta = extract::<Reading>().unwrap();
    assert_eq!(meta.key_columns(), vec!["device", "channel"]);

    let reading = Reading {
        channel: 7,
        device: "sensor-2".into(),
        value: 0.5,
    };
    assert_eq!(reading.key_parts(), vec!["sensor-2", "7"]);
    assert_eq!(composite_key_string(&reading).unwrap(), "sensor-2|7");
}

#[test]
fn single_key_has_no_separator() {
    let order = Order {
        order_id: "ord-1".into(),
        amount: 10.0,
        created: std::time::SystemTime::UNIX_EPOCH,
        note: None,
    };
    assert_eq!(composite_key_string(&order).unwrap(), "ord-1");
}
