//! Declarative query representation.
//!
//! A [`QueryNode`] is one stage of a pipeline over a named source. The
//! structure is a persistent tree (a join holds two input references);
//! builder calls each wrap the previous node and return a new value,
//! never mutating what they wrap. Compilation to query text lives in
//! `riptide-sql`.

pub mod expr;
pub mod window;

use std::sync::Arc;
use std::time::Duration;

pub use expr::{
    field, AggregateExpr, AggregateFn, BinaryOp, Expr, FieldRef, Literal, Selector,
};
pub use window::WindowSpec;

use crate::error::QueryError;

/// Whether a named source is an unbounded event sequence or a keyed
/// latest-value view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Unbounded append-only event sequence.
    Stream,
    /// Keyed latest-value materialization.
    Table,
}

/// Join kinds accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Both sides required.
    Inner,
    /// Left side always emitted.
    Left,
    /// Both sides always emitted.
    FullOuter,
}

impl JoinKind {
    /// The join keyword in the target query language.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// One stage of a query pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A named source.
    Source {
        /// Source name.
        name: String,
        /// Stream or table semantics.
        kind: SourceKind,
    },
    /// Row filter.
    Filter {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Predicate over the input element.
        predicate: Expr,
    },
    /// Column projection.
    Project {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Projected columns in output order.
        columns: Vec<Selector>,
    },
    /// Two-input join.
    Join {
        /// Left pipeline.
        left: Arc<QueryNode>,
        /// Right pipeline.
        right: Arc<QueryNode>,
        /// Join kind.
        kind: JoinKind,
        /// Left key column chain.
        left_key: FieldRef,
        /// Right key column chain.
        right_key: FieldRef,
        /// Time bound for stream-stream joins.
        window: Option<Duration>,
    },
    /// Grouping key.
    GroupBy {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Grouping key chains.
        keys: Vec<FieldRef>,
    },
    /// Aggregate outputs over a grouped input.
    Aggregate {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Aggregate output columns.
        aggregates: Vec<AggregateExpr>,
    },
    /// Window specification ahead of a grouping.
    Window {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Window policy.
        spec: WindowSpec,
    },
    /// Result ordering.
    OrderBy {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Sort key chain.
        key: FieldRef,
        /// Descending order if set.
        descending: bool,
    },
    /// Row limit.
    Limit {
        /// Input stage.
        input: Arc<QueryNode>,
        /// Maximum row count.
        n: u64,
    },
}

impl QueryNode {
    /// The stream/table semantics of this stage's output.
    ///
    /// Aggregations materialize tables; a join is a stream if either
    /// side still is one.
    #[must_use]
    pub fn output_kind(&self) -> SourceKind {
        match self {
            QueryNode::Source { kind, .. } => *kind,
            QueryNode::Filter { input, .. }
            | QueryNode::Project { input, .. }
            | QueryNode::Window { input, .. }
            | QueryNode::OrderBy { input, .. }
            | QueryNode::Limit { input, .. } => input.output_kind(),
            QueryNode::GroupBy { .. } | QueryNode::Aggregate { .. } => SourceKind::Table,
            QueryNode::Join { left, right, .. } => {
                if left.output_kind() == SourceKind::Stream
                    || right.output_kind() == SourceKind::Stream
                {
                    SourceKind::Stream
                } else {
                    SourceKind::Table
                }
            }
        }
    }

    /// The name of the leftmost source underneath this stage.
    #[must_use]
    pub fn root_source(&self) -> &str {
        match self {
            QueryNode::Source { name, .. } => name,
            QueryNode::Filter { input, .. }
            | QueryNode::Project { input, .. }
            | QueryNode::GroupBy { input, .. }
            | QueryNode::Aggregate { input, .. }
            | QueryNode::Window { input, .. }
            | QueryNode::OrderBy { input, .. }
            | QueryNode::Limit { input, .. } => input.root_source(),
            QueryNode::Join { left, .. } => left.root_source(),
        }
    }

    /// Whether any stage in this pipeline aggregates.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        match self {
            QueryNode::Source { .. } => false,
            QueryNode::Aggregate { .. } => true,
            QueryNode::Filter { input, .. }
            | QueryNode::Project { input, .. }
            | QueryNode::GroupBy { input, .. }
            | QueryNode::Window { input, .. }
            | QueryNode::OrderBy { input, .. }
            | QueryNode::Limit { input, .. } => input.contains_aggregate(),
            QueryNode::Join { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
        }
    }

    /// Names of all sources feeding this stage, leftmost first.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        match self {
            QueryNode::Source { name, .. } => vec![name.clone()],
            QueryNode::Filter { input, .. }
            | QueryNode::Project { input, .. }
            | QueryNode::GroupBy { input, .. }
            | QueryNode::Aggregate { input, .. }
            | QueryNode::Window { input, .. }
            | QueryNode::OrderBy { input, .. }
            | QueryNode::Limit { input, .. } => input.source_names(),
            QueryNode::Join { left, right, .. } => {
                let mut names = left.source_names();
                names.extend(right.source_names());
                names
            }
        }
    }
}

/// Immutable, chainable pipeline builder.
///
/// Each call validates the shape of its arguments and returns a new
/// builder wrapping the previous node; the wrapped nodes are shared,
/// never copied or mutated.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    node: Arc<QueryNode>,
}

impl QueryBuilder {
    /// Start a pipeline from a named source.
    #[must_use]
    pub fn from_source(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            node: Arc::new(QueryNode::Source {
                name: name.into(),
                kind,
            }),
        }
    }

    /// Start a pipeline from a stream source.
    #[must_use]
    pub fn stream(name: impl Into<String>) -> Self {
        Self::from_source(name, SourceKind::Stream)
    }

    /// Start a pipeline from a table source.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::from_source(name, SourceKind::Table)
    }

    /// Continue from an existing node.
    #[must_use]
    pub fn from_node(node: Arc<QueryNode>) -> Self {
        Self { node }
    }

    /// The underlying node.
    #[must_use]
    pub fn node(&self) -> Arc<QueryNode> {
        Arc::clone(&self.node)
    }

    fn wrap(&self, node: QueryNode) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// Window stages admit only grouping or aggregation on top.
    fn reject_after_window(&self, op: &str) -> Result<(), QueryError> {
        if matches!(self.node.as_ref(), QueryNode::Window { .. }) {
            return Err(QueryError::InvalidShape(format!(
                "'{op}' cannot follow a window stage; only group_by or aggregate may"
            )));
        }
        Ok(())
    }

    /// Append a filter stage.
    ///
    /// Filters apply to input rows, so they must come before any
    /// aggregation; a predicate over aggregate outputs has no place in
    /// the compiled WHERE clause.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidShape`] if the previous stage is a window
    /// or the pipeline already aggregates.
    pub fn filter(&self, predicate: Expr) -> Result<Self, QueryError> {
        self.reject_after_window("filter")?;
        if self.node.contains_aggregate() {
            return Err(QueryError::InvalidShape(
                "filter cannot follow aggregate; filter the input rows before grouping".into(),
            ));
        }
        Ok(self.wrap(QueryNode::Filter {
            input: self.node(),
            predicate,
        }))
    }

    /// Append a projection stage.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidShape`] if no columns are given or the
    /// previous stage is a window.
    pub fn select(&self, columns: Vec<Selector>) -> Result<Self, QueryError> {
        self.reject_after_window("select")?;
        if columns.is_empty() {
            return Err(QueryError::InvalidShape(
                "projection requires at least one column".into(),
            ));
        }
        Ok(self.wrap(QueryNode::Project {
            input: self.node(),
            columns,
        }))
    }

    /// Append a join stage.
    ///
    /// Key selectors must be simple field-access chains. A window is
    /// only legal when at least one side is a stream; the compiler
    /// additionally requires one for stream-stream joins.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidKeySelector`] for computed key selectors,
    /// [`QueryError::WindowOnTableJoin`] for windowed table-table joins.
    pub fn join(
        &self,
        other: &QueryBuilder,
        kind: JoinKind,
        left_key: impl Into<Expr>,
        right_key: impl Into<Expr>,
        window: Option<Duration>,
    ) -> Result<Self, QueryError> {
        self.reject_after_window("join")?;
        let left_key = left_key.into().as_key_selector()?;
        let right_key = right_key.into().as_key_selector()?;

        let left_kind = self.node.output_kind();
        let right_kind = other.node.output_kind();
        if window.is_some()
            && left_kind == SourceKind::Table
            && right_kind == SourceKind::Table
        {
            return Err(QueryError::WindowOnTableJoin);
        }

        Ok(self.wrap(QueryNode::Join {
            left: self.node(),
            right: other.node(),
            kind,
            left_key,
            right_key,
            window,
        }))
    }

    /// Inner join, convenience over [`QueryBuilder::join`].
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    pub fn inner_join(
        &self,
        other: &QueryBuilder,
        left_key: impl Into<Expr>,
        right_key: impl Into<Expr>,
        window: Option<Duration>,
    ) -> Result<Self, QueryError> {
        self.join(other, JoinKind::Inner, left_key, right_key, window)
    }

    /// Left join, convenience over [`QueryBuilder::join`].
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    pub fn left_join(
        &self,
        other: &QueryBuilder,
        left_key: impl Into<Expr>,
        right_key: impl Into<Expr>,
        window: Option<Duration>,
    ) -> Result<Self, QueryError> {
        self.join(other, JoinKind::Left, left_key, right_key, window)
    }

    /// Full outer join, convenience over [`QueryBuilder::join`].
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    pub fn full_outer_join(
        &self,
        other: &QueryBuilder,
        left_key: impl Into<Expr>,
        right_key: impl Into<Expr>,
        window: Option<Duration>,
    ) -> Result<Self, QueryError> {
        self.join(other, JoinKind::FullOuter, left_key, right_key, window)
    }

    /// Append a grouping stage.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidKeySelector`] for computed key selectors,
    /// [`QueryError::InvalidShape`] for an empty key list.
    pub fn group_by(&self, keys: Vec<Expr>) -> Result<Self, QueryError> {
        if keys.is_empty() {
            return Err(QueryError::InvalidShape(
                "group_by requires at least one key".into(),
            ));
        }
        let keys = keys
            .into_iter()
            .map(|k| k.as_key_selector())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.wrap(QueryNode::GroupBy {
            input: self.node(),
            keys,
        }))
    }

    /// Append an aggregation stage.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidShape`] for an empty aggregate list.
    pub fn aggregate(&self, aggregates: Vec<AggregateExpr>) -> Result<Self, QueryError> {
        if aggregates.is_empty() {
            return Err(QueryError::InvalidShape(
                "aggregate requires at least one expression".into(),
            ));
        }
        Ok(self.wrap(QueryNode::Aggregate {
            input: self.node(),
            aggregates,
        }))
    }

    /// Append a window stage. Only `group_by`/`aggregate` may follow.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidShape`] when stacked directly on another
    /// window.
    pub fn window(&self, spec: WindowSpec) -> Result<Self, QueryError> {
        self.reject_after_window("window")?;
        Ok(self.wrap(QueryNode::Window {
            input: self.node(),
            spec,
        }))
    }

    /// Append an ordering stage.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidKeySelector`] for computed sort keys,
    /// [`QueryError::InvalidShape`] if the previous stage is a window.
    pub fn order_by(&self, key: impl Into<Expr>, descending: bool) -> Result<Self, QueryError> {
        self.reject_after_window("order_by")?;
        let key = key.into().as_key_selector()?;
        Ok(self.wrap(QueryNode::OrderBy {
            input: self.node(),
            key,
            descending,
        }))
    }

    /// Append a row limit.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidShape`] if the previous stage is a window.
    pub fn limit(&self, n: u64) -> Result<Self, QueryError> {
        self.reject_after_window("limit")?;
        Ok(self.wrap(QueryNode::Limit {
            input: self.node(),
            n,
        }))
    }
}
