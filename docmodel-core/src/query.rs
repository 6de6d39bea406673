//! Backend-neutral query expressions.
//!
//! Queries are written against storage keys and stored values. Application code normally
//! builds them through [`Criteria`](crate::criteria::Criteria), which resolves field names,
//! aliases and localized keys and coerces values through the field codecs; the types here
//! are what a [`StoreBackend`](crate::backend::StoreBackend) receives.
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("n", "Ada").and(Filter::gte("age", 18)))
//!     .sort("age", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Field names may be dotted paths (`title.en`) reaching into embedded documents.
//!
//! # Operators
//!
//! Every [`FieldOp`] has a stored-form operator key (`$eq`, `$gte`, `$in`, ...). Operator
//! documents such as `{ "$gte": 1, "$lte": 5 }` map onto one condition per key, joined by
//! AND.

use bson::Bson;

use crate::error::DocumentError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Field and direction to order results by.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Storage key or dotted path.
    pub field: String,
    pub direction: SortDirection,
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// `$eq`. An array field matches when any element is equal.
    Eq,
    /// `$ne`.
    Ne,
    /// `$gt`.
    Gt,
    /// `$gte`.
    Gte,
    /// `$lt`.
    Lt,
    /// `$lte`.
    Lte,
    /// `$in`: the value, or any element of an array value, is one of the operands.
    AnyOf,
    /// `$nin`: neither the value nor any element of an array value is one of the operands.
    NoneOf,
}

impl FieldOp {
    /// Every operator, in declaration order.
    pub const ALL: [FieldOp; 8] = [
        FieldOp::Eq,
        FieldOp::Ne,
        FieldOp::Gt,
        FieldOp::Gte,
        FieldOp::Lt,
        FieldOp::Lte,
        FieldOp::AnyOf,
        FieldOp::NoneOf,
    ];

    /// Stored-form operator key.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    /// Maps a stored-form operator key such as `$gte` to its operator.
    pub fn from_operator(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.operator() == key)
    }
}

/// A filter expression.
///
/// Conditions are joined with [`Expr::and`] or [`Filter::and`]; a criteria chain produces
/// nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every expression matches.
    And(Vec<Expr>),
    /// Field is present (`true`) or absent (`false`).
    Exists(String, bool),
    /// Compares the value at `field` with `value`.
    Field {
        /// Storage key or dotted path.
        field: String,
        op: FieldOp,
        /// Stored-form operand.
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines with `other` using logical AND, flattening an existing AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// Filter, sort and pagination of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// `None` matches every document.
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<Sort>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Shorthands for building [`Expr`]s over storage keys.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Matches when the field, or any element of an array field, is one of `values`.
    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, values.into())
    }

    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, values.into())
    }
}

/// Fluent constructor for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter, replacing any previous one.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Number of matching documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree. Backends implement this to evaluate or translate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    /// Dispatches on the expression kind.
    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        assert!(matches!(expr, Expr::And(ref list) if list.len() == 3));
    }

    #[test]
    fn operators_map_from_stored_keys() {
        assert_eq!(FieldOp::from_operator("$lte"), Some(FieldOp::Lte));
        assert_eq!(FieldOp::from_operator("$in"), Some(FieldOp::AnyOf));
        assert_eq!(FieldOp::from_operator("$regex"), None);

        for op in FieldOp::ALL {
            assert_eq!(FieldOp::from_operator(op.operator()), Some(op));
        }
    }
}
