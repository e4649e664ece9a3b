//! Query composition example: build pipelines as values and print the
//! statements they compile to. No engine required.
//!
//! ```bash
//! cargo run --example compose_queries
//! ```

use riptide::prelude::*;
use riptide::sql::compile_select;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Filtered push query over a stream.
    let big_orders = QueryBuilder::stream("orders").filter(field("amount").gt(100))?;
    println!("{}", compile_select(&big_orders.node())?);

    // Windowed aggregation: totals per region per minute.
    let totals = QueryBuilder::stream("orders")
        .window(WindowSpec::tumbling(Duration::from_secs(60)))?
        .group_by(vec![field("region").into()])?
        .aggregate(vec![
            AggregateExpr::count("n"),
            AggregateExpr::sum(field("amount"), "total")?,
        ])?;
    println!("{}", compile_select(&totals.node())?);

    // Stream-stream join needs a time bound.
    let orders = QueryBuilder::stream("orders");
    let payments = QueryBuilder::stream("payments");
    let settled = orders.inner_join(
        &payments,
        field("order_id"),
        field("order_id"),
        Some(Duration::from_secs(3600)),
    )?;
    println!("{}", compile_select(&settled.node())?);

    // Stream-table enrichment joins carry no window.
    let customers = QueryBuilder::table("customers");
    let enriched = orders.left_join(&customers, field("customer_id"), field("id"), None)?;
    println!("{}", compile_select(&enriched.node())?);

    Ok(())
}
