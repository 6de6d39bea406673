//! Schemas: the ordered field declarations of one model, plus the metadata copied to subtypes.
//!
//! A [`Schema`] is produced by a [`SchemaBuilder`], obtained from
//! [`ModelRegistry::schema`](crate::model::ModelRegistry::schema) for a root model or from
//! [`ModelRegistry::extend`](crate::model::ModelRegistry::extend) for a subtype. Extending
//! copies everything the parent declared at that moment; the parent is never touched and
//! later changes to it do not reach the child.
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{field::FieldOptions, model::ModelRegistry};
//!
//! let mut models = ModelRegistry::default();
//!
//! let person = models
//!     .schema("Person")
//!     .field("name", FieldOptions::typed("string"))?
//!     .field("age", FieldOptions::typed("integer").default_value(0))?;
//! models.register(person)?;
//!
//! let doctor = models
//!     .extend("Person", "Doctor")?
//!     .field("specialty", FieldOptions::typed("string"))?;
//! models.register(doctor)?;
//! ```

use bson::oid::ObjectId;
use indexmap::IndexMap;
use log::debug;
use std::{collections::HashMap, sync::Arc};

use crate::{
    codec::{CodecRegistry, ObjectIdCodec},
    error::SchemaError,
    field::{FieldDescriptor, FieldOptions},
    i18n::LocaleProvider,
    query::{Expr, SortDirection},
};

/// Name of the identity field.
pub const ID_FIELD: &str = "id";
/// Storage key of the identity field.
pub const ID_KEY: &str = "_id";

/// Names that collide with document accessors and cannot be used as field names.
pub const RESERVED_NAMES: &[&str] = &[
    "attributes",
    "changed",
    "changed_fields",
    "changes",
    "collection_name",
    "commit_changes",
    "get",
    "model_name",
    "new_record",
    "peek",
    "persisted",
    "previous_changes",
    "raw",
    "read",
    "remove",
    "reset_field",
    "schema",
    "set",
    "validate",
    "write",
];

/// An index declaration handed to the storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortDirection)>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    /// An ascending index on a single storage key.
    pub fn on(key: impl Into<String>) -> Self {
        Self {
            keys: vec![(key.into(), SortDirection::Asc)],
            unique: false,
            sparse: false,
        }
    }

    pub fn and(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((key.into(), direction));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }
}

/// A validation rule checked by [`Document::validate`](crate::document::Document::validate).
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The field must hold a non-blank value.
    Presence(String),
    /// The length of a string or array field must lie within the bounds.
    Length {
        field: String,
        min: Option<usize>,
        max: Option<usize>,
    },
}

/// Field declarations and metadata of one model.
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: String,
    collection_name: String,
    discriminator_key: String,
    discriminator_value: String,
    ancestors: Vec<String>,
    dynamic: bool,
    fields: IndexMap<String, FieldDescriptor>,
    storage_keys: HashMap<String, String>,
    indexes: Vec<IndexSpec>,
    scopes: IndexMap<String, Expr>,
    validations: Vec<Validation>,
    locales: Arc<dyn LocaleProvider>,
}

impl Schema {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Storage key under which every document records its discriminator.
    pub fn discriminator_key(&self) -> &str {
        &self.discriminator_key
    }

    /// Value identifying this model within its hierarchy.
    pub fn discriminator_value(&self) -> &str {
        &self.discriminator_value
    }

    /// Names of the models this one extends, nearest first.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.ancestors.first().map(String::as_str)
    }

    /// Returns true if this model is `model_name` or extends it.
    pub fn is_kind_of(&self, model_name: &str) -> bool {
        self.model_name == model_name || self.ancestors.iter().any(|ancestor| ancestor == model_name)
    }

    /// Whether undeclared attributes may be read and written.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Declared fields, in declaration order with inherited fields first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn field_by_storage_key(&self, key: &str) -> Option<&FieldDescriptor> {
        self.storage_keys
            .get(key)
            .and_then(|name| self.fields.get(name))
    }

    /// Looks a field up by name, then by storage key.
    pub fn resolve(&self, name_or_key: &str) -> Option<&FieldDescriptor> {
        self.field(name_or_key)
            .or_else(|| self.field_by_storage_key(name_or_key))
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.scopes
            .iter()
            .map(|(name, expr)| (name.as_str(), expr))
    }

    pub fn scope(&self, name: &str) -> Option<&Expr> {
        self.scopes.get(name)
    }

    pub fn validations(&self) -> &[Validation] {
        &self.validations
    }

    /// Source of the active locale and its fallback chain.
    pub fn locales(&self) -> &Arc<dyn LocaleProvider> {
        &self.locales
    }

    /// Active locale followed by its fallbacks.
    pub fn locale_chain(&self) -> Vec<String> {
        let locale = self.locales.locale();
        self.locales.fallbacks(&locale)
    }
}

/// Builds a [`Schema`] one declaration at a time.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
    codecs: Arc<CodecRegistry>,
}

impl SchemaBuilder {
    /// Starts a root model. The identity and discriminator fields are declared up front.
    pub(crate) fn root(
        model_name: &str,
        discriminator_key: &str,
        codecs: Arc<CodecRegistry>,
        locales: Arc<dyn LocaleProvider>,
    ) -> Self {
        let mut builder = Self {
            schema: Schema {
                model_name: model_name.to_string(),
                collection_name: default_collection_name(model_name),
                discriminator_key: discriminator_key.to_string(),
                discriminator_value: model_name.to_string(),
                ancestors: Vec::new(),
                dynamic: false,
                fields: IndexMap::new(),
                storage_keys: HashMap::new(),
                indexes: Vec::new(),
                scopes: IndexMap::new(),
                validations: Vec::new(),
                locales,
            },
            codecs,
        };

        let discriminator = FieldDescriptor::new(discriminator_key.to_string(), FieldOptions::new(), None);
        let identity = Self::identity_descriptor(default_identity(), &builder.codecs);
        builder.insert(discriminator);
        builder.insert(identity);

        builder
    }

    /// Starts a subtype of `parent`, copying its fields and metadata.
    pub(crate) fn extend(parent: &Schema, model_name: &str, codecs: Arc<CodecRegistry>) -> Self {
        let mut ancestors = Vec::with_capacity(parent.ancestors.len() + 1);
        ancestors.push(parent.model_name.clone());
        ancestors.extend(parent.ancestors.iter().cloned());

        Self {
            schema: Schema {
                model_name: model_name.to_string(),
                discriminator_value: model_name.to_string(),
                ancestors,
                ..parent.clone()
            },
            codecs,
        }
    }

    fn identity_descriptor(options: FieldOptions, codecs: &CodecRegistry) -> FieldDescriptor {
        let codec = options
            .type_tag
            .as_deref()
            .and_then(|tag| codecs.lookup(tag));

        FieldDescriptor::new(ID_FIELD.to_string(), options.as_key(ID_KEY), codec)
    }

    fn insert(&mut self, field: FieldDescriptor) -> &FieldDescriptor {
        if let Some(previous) = self.schema.fields.get(field.name()) {
            self.schema.storage_keys.remove(previous.storage_key());
        }

        self.schema
            .storage_keys
            .insert(field.storage_key().to_string(), field.name().to_string());
        let (index, _) = self
            .schema
            .fields
            .insert_full(field.name().to_string(), field);

        &self.schema.fields[index]
    }

    /// Declares a field and returns its descriptor.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::ReservedName`] if `name` collides with a document accessor
    /// - [`SchemaError::DuplicateField`] if `name` is already declared and `overwrite` is not set
    /// - [`SchemaError::DuplicateStorageKey`] if the storage key belongs to another field
    /// - [`SchemaError::UnknownCodec`] if no codec is registered for the type tag
    pub fn declare_field(&mut self, name: &str, options: FieldOptions) -> Result<&FieldDescriptor, SchemaError> {
        if RESERVED_NAMES.contains(&name) || name == ID_FIELD || name == self.schema.discriminator_key {
            return Err(SchemaError::ReservedName(name.to_string()));
        }

        if self.schema.fields.contains_key(name) && !options.overwrite {
            return Err(SchemaError::DuplicateField(
                name.to_string(),
                self.schema.model_name.clone(),
            ));
        }

        let storage_key = options.storage_key.as_deref().unwrap_or(name);
        let taken = self
            .schema
            .storage_keys
            .get(storage_key)
            .is_some_and(|owner| owner != name);
        if taken || (storage_key != name && self.schema.fields.contains_key(storage_key)) {
            return Err(SchemaError::DuplicateStorageKey(
                storage_key.to_string(),
                self.schema.model_name.clone(),
            ));
        }

        let codec = match options.type_tag.as_deref() {
            Some(tag) => Some(
                self.codecs
                    .lookup(tag)
                    .ok_or_else(|| SchemaError::UnknownCodec(tag.to_string()))?,
            ),
            None => None,
        };

        debug!("declared field '{name}' on model {}", self.schema.model_name);

        Ok(self.insert(FieldDescriptor::new(name.to_string(), options, codec)))
    }

    /// Declares a field, consuming and returning the builder for chaining.
    pub fn field(mut self, name: &str, options: FieldOptions) -> Result<Self, SchemaError> {
        self.declare_field(name, options)?;
        Ok(self)
    }

    /// Replaces the identity field's type and default. The storage key stays `_id`.
    pub fn identity(mut self, options: FieldOptions) -> Result<Self, SchemaError> {
        if let Some(tag) = options.type_tag.as_deref() {
            if !self.codecs.contains(tag) {
                return Err(SchemaError::UnknownCodec(tag.to_string()));
            }
        }

        let identity = Self::identity_descriptor(options, &self.codecs);
        self.insert(identity);

        Ok(self)
    }

    pub fn dynamic(mut self, enabled: bool) -> Self {
        self.schema.dynamic = enabled;
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.schema.collection_name = name.into();
        self
    }

    /// Overrides the value stored in the discriminator key. Defaults to the model name.
    pub fn discriminator_value(mut self, value: impl Into<String>) -> Self {
        self.schema.discriminator_value = value.into();
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.schema.indexes.push(index);
        self
    }

    /// Declares a named filter. Scope expressions are written against storage keys.
    pub fn scope(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.schema.scopes.insert(name.into(), expr);
        self
    }

    pub fn validates_presence_of(mut self, field: impl Into<String>) -> Self {
        self.schema.validations.push(Validation::Presence(field.into()));
        self
    }

    pub fn validates_length_of(mut self, field: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Self {
        self.schema.validations.push(Validation::Length {
            field: field.into(),
            min,
            max,
        });
        self
    }

    pub fn model_name(&self) -> &str {
        &self.schema.model_name
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

fn default_identity() -> FieldOptions {
    FieldOptions::typed(ObjectIdCodec::TAG)
        .default_with(|_| Ok(ObjectId::new().into()))
        .pre_processed()
}

/// `BlogPost` becomes `blog_posts`.
fn default_collection_name(model_name: &str) -> String {
    let mut name = String::with_capacity(model_name.len() + 2);

    for (index, c) in model_name.chars().enumerate() {
        if c.is_uppercase() {
            if index > 0 {
                name.push('_');
            }
            name.extend(c.to_lowercase());
        } else {
            name.push(c);
        }
    }

    name.push('s');
    name
}
