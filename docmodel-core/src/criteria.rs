//! Criteria: queries written in application terms.
//!
//! A [`Criteria`] is created by [`ModelRegistry::criteria`](crate::model::ModelRegistry::criteria).
//! Conditions name fields the way application code does; the criteria resolves aliases,
//! points localized fields at the active locale and evolves values through the field codec,
//! then produces a [`Query`] for the storage backend. Querying a model that takes part in an
//! inheritance hierarchy adds a filter on the discriminator that matches the model and all of
//! its registered subtypes.

use bson::{Bson, Document as BsonDocument};
use std::{borrow::Cow, sync::Arc};

use crate::{
    error::{DocumentError, DocumentResult},
    field::FieldDescriptor,
    query::{Expr, FieldOp, Query, Sort, SortDirection},
    schema::Schema,
};

#[derive(Debug, Clone)]
pub struct Criteria {
    schema: Arc<Schema>,
    discriminators: Option<Vec<String>>,
    conditions: Vec<Expr>,
    limit: Option<usize>,
    offset: Option<usize>,
    sort: Option<Sort>,
}

impl Criteria {
    pub(crate) fn new(schema: Arc<Schema>, discriminators: Option<Vec<String>>) -> Self {
        Self {
            schema,
            discriminators,
            conditions: Vec::new(),
            limit: None,
            offset: None,
            sort: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn collection_name(&self) -> &str {
        self.schema.collection_name()
    }

    /// Discriminator values the results are restricted to, if any.
    pub fn discriminators(&self) -> Option<&[String]> {
        self.discriminators.as_deref()
    }

    fn resolve(&self, name: &str) -> DocumentResult<Cow<'_, FieldDescriptor>> {
        match self.schema.resolve(name) {
            Some(field) => Ok(Cow::Borrowed(field)),
            None if self.schema.is_dynamic() => Ok(Cow::Owned(FieldDescriptor::dynamic(name))),
            None => Err(DocumentError::UnknownAttribute(
                name.to_string(),
                self.schema.model_name().to_string(),
            )),
        }
    }

    /// Storage path of a field; localized fields point at the active locale.
    fn path(&self, field: &FieldDescriptor) -> String {
        if field.is_localized() {
            format!("{}.{}", field.storage_key(), self.schema.locales().locale())
        } else {
            field.storage_key().to_string()
        }
    }

    /// Adds `name == value`.
    ///
    /// When the evolved value is an operator document (as the `range` codec produces), each
    /// operator becomes its own condition.
    pub fn where_eq(mut self, name: &str, value: impl Into<Bson>) -> DocumentResult<Self> {
        let field = self.resolve(name)?;
        let path = self.path(&field);
        let evolved = field.evolve(value.into())?;

        let condition = match operator_conditions(&path, &evolved) {
            Some(conditions) => Expr::And(conditions),
            None => Expr::field(path, FieldOp::Eq, evolved),
        };
        drop(field);

        self.conditions.push(condition);
        Ok(self)
    }

    /// Adds `name <op> value`. List operands of `AnyOf`/`NoneOf` are evolved element-wise.
    pub fn where_op(mut self, name: &str, op: FieldOp, value: impl Into<Bson>) -> DocumentResult<Self> {
        let field = self.resolve(name)?;
        let path = self.path(&field);
        let evolved = field.evolve(value.into())?;
        drop(field);

        self.conditions.push(Expr::field(path, op, evolved));
        Ok(self)
    }

    /// Adds `name ∈ values`.
    pub fn any_in(self, name: &str, values: impl IntoIterator<Item = impl Into<Bson>>) -> DocumentResult<Self> {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.where_op(name, FieldOp::AnyOf, values)
    }

    pub fn exists(mut self, name: &str, should_exist: bool) -> DocumentResult<Self> {
        let field = self.resolve(name)?;
        let path = self.path(&field);
        drop(field);

        self.conditions.push(Expr::Exists(path, should_exist));
        Ok(self)
    }

    /// Adds a named scope declared on the schema.
    pub fn scoped(mut self, scope: &str) -> DocumentResult<Self> {
        let expr = self
            .schema
            .scope(scope)
            .cloned()
            .ok_or_else(|| DocumentError::UnknownAttribute(scope.to_string(), self.schema.model_name().to_string()))?;

        self.conditions.push(expr);
        Ok(self)
    }

    /// Adds a raw expression written against storage keys.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.conditions.push(expr);
        self
    }

    pub fn order_by(mut self, name: &str, direction: SortDirection) -> DocumentResult<Self> {
        let field = self.resolve(name)?;
        let path = self.path(&field);
        drop(field);

        self.sort = Some(Sort { field: path, direction });
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The complete filter, discriminator included.
    pub fn selector(&self) -> Option<Expr> {
        let mut conditions = Vec::with_capacity(self.conditions.len() + 1);

        if let Some(values) = &self.discriminators {
            conditions.push(Expr::field(
                self.schema.discriminator_key().to_string(),
                FieldOp::AnyOf,
                Bson::Array(values.iter().cloned().map(Bson::String).collect()),
            ));
        }
        conditions.extend(self.conditions.iter().cloned());

        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Expr::And(conditions)),
        }
    }

    pub fn into_query(self) -> Query {
        Query {
            filter: self.selector(),
            limit: self.limit,
            offset: self.offset,
            sort: self.sort,
        }
    }
}

/// Splits `{$gte: a, $lt: b}` into one condition per operator. Returns `None` unless every
/// key is a known operator.
fn operator_conditions(path: &str, value: &Bson) -> Option<Vec<Expr>> {
    let Bson::Document(operators) = value else {
        return None;
    };
    if operators.is_empty() {
        return None;
    }

    operators
        .iter()
        .map(|(key, operand)| {
            FieldOp::from_operator(key).map(|op| Expr::field(path.to_string(), op, operand.clone()))
        })
        .collect()
}

impl From<Criteria> for Query {
    fn from(criteria: Criteria) -> Self {
        criteria.into_query()
    }
}

/// Selector as a stored-form document, for logging.
pub fn describe(expr: &Expr) -> BsonDocument {
    let mut described = BsonDocument::new();
    match expr {
        Expr::And(exprs) => {
            described.insert("$and", exprs.iter().map(describe).collect::<Vec<_>>());
        }
        Expr::Exists(field, should_exist) => {
            let mut condition = BsonDocument::new();
            condition.insert("$exists", *should_exist);
            described.insert(field.clone(), condition);
        }
        Expr::Field { field, op, value } => {
            let mut condition = BsonDocument::new();
            condition.insert(op.operator(), value.clone());
            described.insert(field.clone(), condition);
        }
    }

    described
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::FieldOptions, model::ModelRegistry, query::Filter};
    use bson::doc;

    fn registry() -> ModelRegistry {
        let mut models = ModelRegistry::default();

        let post = models
            .schema("Post")
            .field("title", FieldOptions::typed("string").localize())
            .unwrap()
            .field("rank", FieldOptions::typed("integer").as_key("r"))
            .unwrap()
            .field("window", FieldOptions::typed("range"))
            .unwrap()
            .scope("ranked", Filter::exists("r"));
        models.register(post).unwrap();

        let note = models
            .schema("Note")
            .field("body", FieldOptions::typed("string"))
            .unwrap();
        models.register(note).unwrap();

        let draft = models.extend("Post", "Draft").unwrap();
        models.register(draft).unwrap();

        models
    }

    #[test]
    fn aliases_and_codecs_are_applied() {
        let criteria = registry()
            .criteria("Note")
            .unwrap()
            .where_eq("body", 12)
            .unwrap();

        assert_eq!(criteria.selector(), Some(Filter::eq("body", "12")));

        let criteria = registry()
            .criteria("Post")
            .unwrap()
            .where_op("rank", FieldOp::Gt, "3")
            .unwrap();
        let Some(Expr::And(conditions)) = criteria.selector() else {
            panic!("expected a conjunction");
        };
        assert_eq!(conditions[1], Filter::gt("r", 3));
    }

    #[test]
    fn localized_fields_point_at_the_active_locale() {
        let criteria = registry()
            .criteria("Note")
            .unwrap()
            .filter(Filter::eq("x", 1));
        assert_eq!(criteria.selector(), Some(Filter::eq("x", 1)));

        let models = registry();
        let criteria = models
            .criteria("Draft")
            .unwrap()
            .where_eq("title", "Hello")
            .unwrap();
        let Some(Expr::And(conditions)) = criteria.selector() else {
            panic!("expected a conjunction");
        };
        assert_eq!(conditions[1], Filter::eq("title.en", "Hello"));
    }

    #[test]
    fn discriminator_filter_covers_subtypes() {
        let models = registry();

        assert_eq!(
            models.criteria("Post").unwrap().selector(),
            Some(Filter::any_of("_type", vec![Bson::from("Post"), Bson::from("Draft")]))
        );
        assert_eq!(
            models.criteria("Draft").unwrap().selector(),
            Some(Filter::any_of("_type", vec![Bson::from("Draft")]))
        );
        assert_eq!(models.criteria("Note").unwrap().selector(), None);
    }

    #[test]
    fn range_values_expand_to_bounds() {
        let criteria = registry()
            .criteria("Post")
            .unwrap()
            .where_eq("window", doc! { "min": 1, "max": 5 })
            .unwrap();

        let Some(Expr::And(conditions)) = criteria.selector() else {
            panic!("expected a conjunction");
        };
        assert_eq!(
            conditions[1],
            Expr::And(vec![Filter::gte("window", 1), Filter::lte("window", 5)])
        );
    }

    #[test]
    fn unknown_fields_and_scopes_are_refused() {
        let models = registry();

        assert!(models.criteria("Note").unwrap().where_eq("missing", 1).is_err());
        assert!(models.criteria("Note").unwrap().scoped("ranked").is_err());
        assert!(models.criteria("Draft").unwrap().scoped("ranked").is_ok());
    }

    #[test]
    fn describe_renders_operator_documents() {
        assert_eq!(
            describe(&Filter::and([Filter::gte("age", 18), Filter::exists("n")])),
            doc! { "$and": [ { "age": { "$gte": 18 } }, { "n": { "$exists": true } } ] }
        );
    }
}
