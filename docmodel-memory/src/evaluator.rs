//! Query expression evaluation for in-memory document filtering.
//!
//! Documents are evaluated in their stored form. Field names may be dotted paths, so a
//! localized condition on `title.en` reaches into the translations document.

use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap, convert::Infallible};

use docmodel_core::query::{Expr, FieldOp, QueryVisitor};

/// Comparable view of a stored BSON value.
///
/// Integers and doubles compare as numbers, so `Int32(30)` equals `Double(30.0)`. Kinds
/// without an ordering here (binary, regex, timestamps) view as `Null`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null, or a kind with no comparison.
    Null,
    Bool(bool),
    /// Any integer or double.
    Number(f64),
    DateTime(DateTime),
    /// Ordered by its bytes, which lead with the creation time.
    ObjectId(ObjectId),
    /// Strings and symbols.
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Embedded document. Equality ignores key order.
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Symbol(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Looks up a dotted path in a stored document.
pub(crate) fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Matches one stored document against a filter.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> bool {
        match self.visit_expr(expr) {
            Ok(matched) => matched,
            Err(never) => match never {},
        }
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a BsonDocument>,
        expr: &Expr,
    ) -> Vec<BsonDocument> {
        documents
            .into_iter()
            .filter(|doc| DocumentEvaluator::new(doc).evaluate(expr))
            .cloned()
            .collect()
    }
}

/// True when `field_value`, or any element of it when it is an array, equals one of `operands`.
fn any_of(field_value: &Bson, operands: &Bson) -> bool {
    let candidates = match Comparable::from(field_value) {
        Comparable::Array(items) => items,
        single => vec![single],
    };

    match Comparable::from(operands) {
        Comparable::Array(values) => values
            .iter()
            .any(|value| candidates.iter().any(|candidate| candidate == value)),
        single => candidates.iter().any(|candidate| *candidate == single),
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            // A missing field equals null and is never one of the excluded values.
            return Ok(match op {
                FieldOp::Eq => matches!(value, Bson::Null),
                FieldOp::Ne => !matches!(value, Bson::Null),
                FieldOp::NoneOf => true,
                _ => false,
            });
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => match &left {
                Comparable::Array(items) if !matches!(right, Comparable::Array(_)) => {
                    items.iter().any(|item| *item == right)
                }
                _ => left == right,
            },
            FieldOp::Ne => left != right,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => match left.partial_cmp(&right) {
                Some(ordering) => match op {
                    FieldOp::Gt => ordering == Ordering::Greater,
                    FieldOp::Gte => ordering != Ordering::Less,
                    FieldOp::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            },
            FieldOp::AnyOf => any_of(field_value, value),
            FieldOp::NoneOf => !any_of(field_value, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    fn matches(document: &BsonDocument, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr)
    }

    #[test]
    fn dotted_paths_reach_into_translations() {
        let post = doc! { "title": { "en": "Marvelous!", "es": "Maravilloso!" }, "tags": ["a", "b"] };

        assert!(matches(&post, Filter::eq("title.en", "Marvelous!")));
        assert!(!matches(&post, Filter::eq("title.de", "Marvelous!")));
        assert!(matches(&post, Filter::not_exists("title.de")));
        assert!(matches(&post, Filter::eq("tags.1", "b")));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let person = doc! { "age": 30_i64, "score": 2.5 };

        assert!(matches(&person, Filter::eq("age", 30)));
        assert!(matches(&person, Filter::gte("age", 30.0)));
        assert!(matches(&person, Filter::lt("score", 3)));
        assert!(!matches(&person, Filter::gt("age", "29")));
    }

    #[test]
    fn any_of_matches_scalars_and_array_elements() {
        let dog = doc! { "_type": "Dog", "tags": ["good", "loud"] };
        let types = vec![Bson::from("Animal"), Bson::from("Dog")];

        assert!(matches(&dog, Filter::any_of("_type", types.clone())));
        assert!(matches(&dog, Filter::any_of("tags", vec![Bson::from("loud")])));
        assert!(matches(&dog, Filter::none_of("tags", vec![Bson::from("quiet")])));
        assert!(!matches(&doc! { "_type": "Cat" }, Filter::any_of("_type", types)));
    }

    #[test]
    fn object_ids_compare_by_value() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };

        assert!(matches(&document, Filter::eq("_id", id)));
        assert!(!matches(&document, Filter::eq("_id", id.to_hex())));
    }

    #[test]
    fn missing_fields_equal_null() {
        let empty = BsonDocument::new();

        assert!(matches(&empty, Filter::eq("name", Bson::Null)));
        assert!(!matches(&empty, Filter::eq("name", "Ada")));
        assert!(matches(&empty, Filter::none_of("name", vec![Bson::from("Ada")])));
    }
}
