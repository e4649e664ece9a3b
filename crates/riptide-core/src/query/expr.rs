//! Typed selector and predicate expressions.
//!
//! The expression language is a deliberately closed set: field-access
//! chains, literals, and a fixed operator table. Anything the target
//! query language cannot express is rejected at build or compile time
//! rather than interpreted.

use std::fmt;

use crate::error::QueryError;

/// A field-access chain (`a` or `a->b->c` for nested structs).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Path segments, outermost first. Never empty.
    pub path: Vec<String>,
}

impl FieldRef {
    /// Reference a top-level column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
        }
    }

    /// Extend the chain into a nested struct field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.path.push(name.into());
        self
    }

    /// Render the chain in the engine's accessor syntax.
    #[must_use]
    pub fn render(&self) -> String {
        self.path.join("->")
    }

    /// `self = other`
    #[must_use]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).eq(other)
    }

    /// `self != other`
    #[must_use]
    pub fn not_eq(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).not_eq(other)
    }

    /// `self > other`
    #[must_use]
    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).gt(other)
    }

    /// `self >= other`
    #[must_use]
    pub fn gte(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).gte(other)
    }

    /// `self < other`
    #[must_use]
    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).lt(other)
    }

    /// `self <= other`
    #[must_use]
    pub fn lte(self, other: impl Into<Expr>) -> Expr {
        Expr::from(self).lte(other)
    }
}

/// Shorthand for [`FieldRef::new`].
#[must_use]
pub fn field(name: impl Into<String>) -> FieldRef {
    FieldRef::new(name)
}

/// A literal value in a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Text literal, single-quoted on the wire.
    Text(String),
    /// Boolean literal.
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Literal::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(i64::from(v))
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Text(v.to_string())
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

/// Binary operators the expression language carries.
///
/// Only the comparison and logical subset compiles; the arithmetic
/// operators exist so that composition failures are explicit rather
/// than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `+` (no query-text mapping)
    Add,
    /// `-` (no query-text mapping)
    Sub,
    /// `*` (no query-text mapping)
    Mul,
    /// `/` (no query-text mapping)
    Div,
}

impl BinaryOp {
    /// The operator symbol in the target query language.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnsupportedOperator`] for operators outside the
    /// closed comparison/logical table.
    pub fn symbol(self) -> Result<&'static str, QueryError> {
        match self {
            BinaryOp::Eq => Ok("="),
            BinaryOp::NotEq => Ok("!="),
            BinaryOp::Gt => Ok(">"),
            BinaryOp::Gte => Ok(">="),
            BinaryOp::Lt => Ok("<"),
            BinaryOp::Lte => Ok("<="),
            BinaryOp::And => Ok("AND"),
            BinaryOp::Or => Ok("OR"),
            BinaryOp::Add => Err(QueryError::UnsupportedOperator("+".into())),
            BinaryOp::Sub => Err(QueryError::UnsupportedOperator("-".into())),
            BinaryOp::Mul => Err(QueryError::UnsupportedOperator("*".into())),
            BinaryOp::Div => Err(QueryError::UnsupportedOperator("/".into())),
        }
    }

    /// Whether the operator is logical (`AND`/`OR`).
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// A predicate or selector expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A field-access chain.
    Column(FieldRef),
    /// A literal value.
    Literal(Literal),
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
}

impl Expr {
    fn binary(op: BinaryOp, left: Expr, right: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right.into()),
        }
    }

    /// `self = other`
    #[must_use]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Eq, self, other)
    }

    /// `self != other`
    #[must_use]
    pub fn not_eq(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::NotEq, self, other)
    }

    /// `self > other`
    #[must_use]
    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Gt, self, other)
    }

    /// `self >= other`
    #[must_use]
    pub fn gte(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Gte, self, other)
    }

    /// `self < other`
    #[must_use]
    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Lt, self, other)
    }

    /// `self <= other`
    #[must_use]
    pub fn lte(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Lte, self, other)
    }

    /// `self AND other`
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, other)
    }

    /// `self OR other`
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, self, other)
    }

    /// Resolve the expression as a simple field-access chain.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidKeySelector`] if the expression is anything
    /// but a bare column reference.
    pub fn as_key_selector(&self) -> Result<FieldRef, QueryError> {
        match self {
            Expr::Column(field) => Ok(field.clone()),
            other => Err(QueryError::InvalidKeySelector(format!("{other:?}"))),
        }
    }
}

impl From<FieldRef> for Expr {
    fn from(field: FieldRef) -> Self {
        Expr::Column(field)
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}

macro_rules! impl_literal_expr {
    ($($ty:ty),* $(,)?) => {
        $(impl From<$ty> for Expr {
            fn from(v: $ty) -> Self {
                Expr::Literal(v.into())
            }
        })*
    };
}

impl_literal_expr!(i32, i64, f64, &str, bool);

/// One projected column, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// The selected field chain.
    pub field: FieldRef,
    /// Output alias, if renamed.
    pub alias: Option<String>,
}

impl Selector {
    /// Select a field under its own name.
    #[must_use]
    pub fn field(field: FieldRef) -> Self {
        Self { field, alias: None }
    }

    /// Select a field under an alias.
    #[must_use]
    pub fn aliased(field: FieldRef, alias: impl Into<String>) -> Self {
        Self {
            field,
            alias: Some(alias.into()),
        }
    }
}

/// Aggregation functions supported over grouped elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// `COUNT(*)` / `COUNT(col)`
    Count,
    /// `SUM(col)`
    Sum,
    /// `LATEST_BY_OFFSET(col)`
    LatestByOffset,
    /// `EARLIEST_BY_OFFSET(col)`
    EarliestByOffset,
}

impl AggregateFn {
    /// The function name in the target query language.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::LatestByOffset => "LATEST_BY_OFFSET",
            AggregateFn::EarliestByOffset => "EARLIEST_BY_OFFSET",
        }
    }
}

/// One aggregate output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    /// Aggregation function.
    pub func: AggregateFn,
    /// Aggregated field; `None` only for `COUNT(*)`.
    pub field: Option<FieldRef>,
    /// Output column alias.
    pub alias: String,
}

impl AggregateExpr {
    /// `COUNT(*) AS alias`
    #[must_use]
    pub fn count(alias: impl Into<String>) -> Self {
        Self {
            func: AggregateFn::Count,
            field: None,
            alias: alias.into(),
        }
    }

    /// `SUM(selector) AS alias`
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidAggregateSelector`] if the selector is not a
    /// simple field-access chain.
    pub fn sum(selector: impl Into<Expr>, alias: impl Into<String>) -> Result<Self, QueryError> {
        Self::over(AggregateFn::Sum, selector, alias)
    }

    /// `LATEST_BY_OFFSET(selector) AS alias`
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidAggregateSelector`] if the selector is not a
    /// simple field-access chain.
    pub fn latest_by_offset(
        selector: impl Into<Expr>,
        alias: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::over(AggregateFn::LatestByOffset, selector, alias)
    }

    /// `EARLIEST_BY_OFFSET(selector) AS alias`
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidAggregateSelector`] if the selector is not a
    /// simple field-access chain.
    pub fn earliest_by_offset(
        selector: impl Into<Expr>,
        alias: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::over(AggregateFn::EarliestByOffset, selector, alias)
    }

    fn over(
        func: AggregateFn,
        selector: impl Into<Expr>,
        alias: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let expr = selector.into();
        let field = match &expr {
            Expr::Column(field) => field.clone(),
            other => {
                return Err(QueryError::InvalidAggregateSelector(format!("{other:?}")));
            }
        };
        Ok(Self {
            func,
            field: Some(field),
            alias: alias.into(),
        })
    }

    /// Render as `FUNC(arg) AS alias`.
    #[must_use]
    pub fn render(&self) -> String {
        let arg = self
            .field
            .as_ref()
            .map_or_else(|| "*".to_string(), FieldRef::render);
        format!("{}({arg}) AS {}", self.func.name(), self.alias)
    }
}
