//! Pipeline-to-SELECT compilation.
//!
//! Walks a [`QueryNode`] tree bottom-up and emits clauses in the
//! engine's order: `SELECT … FROM … [JOIN …] [WINDOW …] [WHERE …]
//! [GROUP BY …] [ORDER BY …] [LIMIT …] EMIT CHANGES;`. All shape
//! violations are raised here, before any statement text leaves the
//! process.

use riptide_core::error::QueryError;
use riptide_core::query::{
    AggregateExpr, BinaryOp, Expr, FieldRef, JoinKind, QueryNode, Selector, SourceKind,
    WindowSpec,
};

use crate::interval::{render_duration, render_window};
use crate::statement::{CompiledStatement, StatementKind};

#[derive(Default)]
struct SelectParts<'a> {
    source: Option<&'a str>,
    join: Option<JoinClause<'a>>,
    window: Option<&'a WindowSpec>,
    filters: Vec<&'a Expr>,
    projection: Option<&'a [Selector]>,
    group_keys: Option<&'a [FieldRef]>,
    aggregates: Option<&'a [AggregateExpr]>,
    order: Option<(&'a FieldRef, bool)>,
    limit: Option<u64>,
}

struct JoinClause<'a> {
    kind: JoinKind,
    left_source: String,
    right_source: &'a str,
    left_key: &'a FieldRef,
    right_key: &'a FieldRef,
    within: Option<String>,
}

/// Compile a pipeline into a `SELECT` push query.
///
/// # Errors
///
/// Any [`QueryError`] raised by shape validation or operator mapping.
pub fn compile_select(node: &QueryNode) -> Result<CompiledStatement, QueryError> {
    let body = select_body(node)?;
    let statement = CompiledStatement::new(StatementKind::Select, format!("{body} EMIT CHANGES;"));
    tracing::debug!(text = %statement.text, "compiled push query");
    Ok(statement)
}

/// Render the `SELECT` body without terminator, for embedding in
/// `CREATE … AS` statements.
pub(crate) fn select_body(node: &QueryNode) -> Result<String, QueryError> {
    let mut parts = SelectParts::default();
    collect(node, &mut parts)?;

    if parts.window.is_some() && parts.group_keys.is_none() && parts.aggregates.is_none() {
        return Err(QueryError::WindowWithoutAggregate);
    }

    let source = parts
        .source
        .ok_or_else(|| QueryError::InvalidShape("pipeline has no source".into()))?;

    let mut text = format!("SELECT {} FROM {source}", render_select_list(&parts)?);

    if let Some(join) = &parts.join {
        text.push(' ');
        text.push_str(&render_join(join));
    }
    if let Some(spec) = parts.window {
        text.push_str(" WINDOW ");
        text.push_str(&render_window(spec));
    }
    if !parts.filters.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&render_filters(&parts.filters)?);
    }
    if let Some(keys) = parts.group_keys {
        let rendered: Vec<String> = keys.iter().map(FieldRef::render).collect();
        text.push_str(" GROUP BY ");
        text.push_str(&rendered.join(", "));
    }
    if let Some((key, descending)) = parts.order {
        text.push_str(" ORDER BY ");
        text.push_str(&key.render());
        if descending {
            text.push_str(" DESC");
        }
    }
    if let Some(n) = parts.limit {
        text.push_str(&format!(" LIMIT {n}"));
    }
    Ok(text)
}

fn collect<'a>(node: &'a QueryNode, parts: &mut SelectParts<'a>) -> Result<(), QueryError> {
    match node {
        QueryNode::Source { name, .. } => {
            parts.source = Some(name);
        }
        QueryNode::Filter { input, predicate } => {
            collect(input, parts)?;
            parts.filters.push(predicate);
        }
        QueryNode::Project { input, columns } => {
            collect(input, parts)?;
            parts.projection = Some(columns);
        }
        QueryNode::Join {
            left,
            right,
            kind,
            left_key,
            right_key,
            window,
        } => {
            collect(left, parts)?;
            let QueryNode::Source {
                name: right_source, ..
            } = right.as_ref()
            else {
                return Err(QueryError::InvalidShape(
                    "join right side must be a named source".into(),
                ));
            };

            let left_kind = left.output_kind();
            let right_kind = right.output_kind();
            validate_join_window(left, right, left_kind, right_kind, window.is_some())?;

            parts.join = Some(JoinClause {
                kind: *kind,
                left_source: left.root_source().to_string(),
                right_source,
                left_key,
                right_key,
                within: window.map(|d| render_duration(d)),
            });
        }
        QueryNode::GroupBy { input, keys } => {
            collect(input, parts)?;
            parts.group_keys = Some(keys);
        }
        QueryNode::Aggregate { input, aggregates } => {
            collect(input, parts)?;
            parts.aggregates = Some(aggregates);
        }
        QueryNode::Window { input, spec } => {
            collect(input, parts)?;
            parts.window = Some(spec);
        }
        QueryNode::OrderBy {
            input,
            key,
            descending,
        } => {
            collect(input, parts)?;
            parts.order = Some((key, *descending));
        }
        QueryNode::Limit { input, n } => {
            collect(input, parts)?;
            parts.limit = Some(*n);
        }
    }
    Ok(())
}

fn validate_join_window(
    left: &QueryNode,
    right: &QueryNode,
    left_kind: SourceKind,
    right_kind: SourceKind,
    has_window: bool,
) -> Result<(), QueryError> {
    match (left_kind, right_kind) {
        (SourceKind::Stream, SourceKind::Stream) if !has_window => {
            Err(QueryError::MissingJoinWindow {
                left: left.root_source().to_string(),
                right: right.root_source().to_string(),
            })
        }
        (SourceKind::Table, SourceKind::Table) if has_window => {
            Err(QueryError::WindowOnTableJoin)
        }
        _ => Ok(()),
    }
}

fn render_select_list(parts: &SelectParts<'_>) -> Result<String, QueryError> {
    let mut items: Vec<String> = Vec::new();

    if let Some(columns) = parts.projection {
        for selector in columns {
            match &selector.alias {
                Some(alias) => items.push(format!("{} AS {alias}", selector.field.render())),
                None => items.push(selector.field.render()),
            }
        }
    } else if let Some(keys) = parts.group_keys {
        // Grouped queries without an explicit projection expose their keys.
        items.extend(keys.iter().map(FieldRef::render));
    }

    if let Some(aggregates) = parts.aggregates {
        items.extend(aggregates.iter().map(AggregateExpr::render));
    }

    if items.is_empty() {
        return Ok("*".to_string());
    }
    Ok(items.join(", "))
}

fn render_join(join: &JoinClause<'_>) -> String {
    let mut text = format!("{} {}", join.kind.keyword(), join.right_source);
    if let Some(within) = &join.within {
        text.push_str(&format!(" WITHIN {within}"));
    }
    text.push_str(&format!(
        " ON {}.{} = {}.{}",
        join.left_source,
        join.left_key.render(),
        join.right_source,
        join.right_key.render()
    ));
    text
}

fn render_filters(filters: &[&Expr]) -> Result<String, QueryError> {
    let rendered: Vec<String> = filters
        .iter()
        .map(|f| render_expr(f))
        .collect::<Result<_, _>>()?;
    if rendered.len() == 1 {
        return Ok(rendered.into_iter().next().unwrap_or_default());
    }
    Ok(rendered
        .into_iter()
        .map(|f| format!("({f})"))
        .collect::<Vec<_>>()
        .join(" AND "))
}

/// Render an expression with the closed operator table.
///
/// # Errors
///
/// [`QueryError::UnsupportedOperator`] for operators outside the table.
pub fn render_expr(expr: &Expr) -> Result<String, QueryError> {
    match expr {
        Expr::Column(field) => Ok(field.render()),
        Expr::Literal(lit) => Ok(lit.to_string()),
        Expr::Binary { op, left, right } => {
            let symbol = op.symbol()?;
            let left = render_operand(left, *op)?;
            let right = render_operand(right, *op)?;
            Ok(format!("{left} {symbol} {right}"))
        }
    }
}

fn render_operand(expr: &Expr, parent: BinaryOp) -> Result<String, QueryError> {
    let rendered = render_expr(expr)?;
    // Logical combinators parenthesize compound operands; a bare
    // comparison renders without artifacts.
    if parent.is_logical() && matches!(expr, Expr::Binary { .. }) {
        return Ok(format!("({rendered})"));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_core::query::{field, QueryBuilder, WindowSpec};
    use std::time::Duration;

    #[test]
    fn single_predicate_has_no_logical_artifacts() {
        let q = QueryBuilder::stream("orders")
            .filter(field("Amount").gt(100))
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM orders WHERE Amount > 100 EMIT CHANGES;"
        );
        assert!(!stmt.text.contains("AND"));
        assert!(!stmt.text.contains("OR"));
    }

    #[test]
    fn compound_predicate_parenthesizes() {
        let q = QueryBuilder::stream("orders")
            .filter(field("amount").gt(100).and(field("region").eq("eu")))
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert!(stmt
            .text
            .contains("WHERE (amount > 100) AND (region = 'eu')"));
    }

    #[test]
    fn stacked_filters_combine_with_and() {
        let q = QueryBuilder::stream("orders")
            .filter(field("a").gt(1))
            .unwrap()
            .filter(field("b").lt(2))
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert!(stmt.text.contains("WHERE (a > 1) AND (b < 2)"));
    }

    #[test]
    fn arithmetic_operator_rejected() {
        let predicate = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(field("a").into()),
            right: Box::new(1i64.into()),
        };
        let q = QueryBuilder::stream("orders").filter(predicate).unwrap();
        let err = compile_select(&q.node()).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(_)));
    }

    #[test]
    fn stream_stream_join_requires_window() {
        let orders = QueryBuilder::stream("orders");
        let payments = QueryBuilder::stream("payments");
        let q = orders
            .inner_join(&payments, field("order_id"), field("order_id"), None)
            .unwrap();
        let err = compile_select(&q.node()).unwrap_err();
        assert_eq!(
            err,
            QueryError::MissingJoinWindow {
                left: "orders".into(),
                right: "payments".into(),
            }
        );
    }

    #[test]
    fn windowed_stream_stream_join_renders_within() {
        let orders = QueryBuilder::stream("orders");
        let payments = QueryBuilder::stream("payments");
        let q = orders
            .inner_join(
                &payments,
                field("order_id"),
                field("order_id"),
                Some(Duration::from_secs(3600)),
            )
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert!(stmt.text.contains(
            "INNER JOIN payments WITHIN 1 HOURS ON orders.order_id = payments.order_id"
        ));
    }

    #[test]
    fn stream_table_join_never_renders_within() {
        let orders = QueryBuilder::stream("orders");
        let customers = QueryBuilder::table("customers");
        let q = orders
            .left_join(&customers, field("customer_id"), field("id"), None)
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert!(stmt
            .text
            .contains("LEFT JOIN customers ON orders.customer_id = customers.id"));
        assert!(!stmt.text.contains("WITHIN"));
    }

    #[test]
    fn grouped_window_aggregate_renders_in_clause_order() {
        let q = QueryBuilder::stream("orders")
            .window(WindowSpec::tumbling(Duration::from_secs(60)))
            .unwrap()
            .group_by(vec![field("region").into()])
            .unwrap()
            .aggregate(vec![
                AggregateExpr::count("n"),
                AggregateExpr::sum(field("amount"), "total").unwrap(),
            ])
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT region, COUNT(*) AS n, SUM(amount) AS total FROM orders \
             WINDOW TUMBLING (SIZE 1 MINUTES) GROUP BY region EMIT CHANGES;"
        );
    }

    #[test]
    fn window_without_grouping_fails() {
        let q = QueryBuilder::stream("orders")
            .window(WindowSpec::tumbling(Duration::from_secs(60)))
            .unwrap();
        let err = compile_select(&q.node()).unwrap_err();
        assert_eq!(err, QueryError::WindowWithoutAggregate);
    }

    #[test]
    fn order_and_limit_render_last() {
        let q = QueryBuilder::table("balances")
            .order_by(field("total"), true)
            .unwrap()
            .limit(10)
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM balances ORDER BY total DESC LIMIT 10 EMIT CHANGES;"
        );
    }

    #[test]
    fn projection_with_aliases() {
        let q = QueryBuilder::stream("orders")
            .select(vec![
                Selector::field(field("order_id")),
                Selector::aliased(field("amount"), "total"),
            ])
            .unwrap();
        let stmt = compile_select(&q.node()).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT order_id, amount AS total FROM orders EMIT CHANGES;"
        );
    }
}
