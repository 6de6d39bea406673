//! Document instances: one schema, one attribute store and one change tracker.
//!
//! A [`Document`] is the unit application code reads and writes. Every write resolves the
//! field, coerces the value to its stored form through the field's codec and records the
//! transition in the change tracker before it lands in the attributes. Every read
//! demongoizes the raw value afresh; nothing derived from the raw value is cached.
//!
//! # Example
//!
//! ```ignore
//! let mut person = models.new_document("Person")?;
//!
//! person.set("name", "Ada")?;
//! person.set("age", "36")?;
//!
//! assert_eq!(person.read::<i32>("age")?, 36);
//! assert_eq!(person.changed_fields(), vec!["name", "age"]);
//!
//! person.commit_changes();
//! assert!(!person.changed());
//! ```

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, to_value};
use std::{borrow::Cow, sync::Arc};

use crate::{
    attributes::Attributes,
    changes::{Change, ChangeTracker},
    error::{DocumentError, DocumentResult},
    field::{DefaultValue, FieldDescriptor, is_blank},
    schema::{ID_KEY, Schema, Validation},
};

/// Suffix of the bulk-assignment key that sets every translation of a localized field.
pub const TRANSLATIONS_SUFFIX: &str = "_translations";

/// A model instance.
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<Schema>,
    attributes: Attributes,
    tracker: ChangeTracker,
    new_record: bool,
}

fn resolve<'s>(schema: &'s Schema, name: &str) -> DocumentResult<Cow<'s, FieldDescriptor>> {
    match schema.resolve(name) {
        Some(field) => Ok(Cow::Borrowed(field)),
        None if schema.is_dynamic() => Ok(Cow::Owned(FieldDescriptor::dynamic(name))),
        None => Err(DocumentError::UnknownAttribute(
            name.to_string(),
            schema.model_name().to_string(),
        )),
    }
}

fn resolve_localized<'s>(schema: &'s Schema, name: &str) -> DocumentResult<&'s FieldDescriptor> {
    schema
        .resolve(name)
        .filter(|field| field.is_localized())
        .ok_or_else(|| {
            DocumentError::UnknownAttribute(
                format!("{name}{TRANSLATIONS_SUFFIX}"),
                schema.model_name().to_string(),
            )
        })
}

impl Document {
    /// Creates a new document with its defaults applied.
    pub fn new(schema: Arc<Schema>) -> DocumentResult<Self> {
        Self::with_attributes(schema, BsonDocument::new())
    }

    /// Creates a new document and bulk-assigns `attributes`, keyed by field name.
    ///
    /// Pre-processed defaults are applied before the assignment and see none of the assigned
    /// values; the remaining defaults are applied after it for the fields left unset.
    pub fn with_attributes(schema: Arc<Schema>, attributes: BsonDocument) -> DocumentResult<Self> {
        let mut document = Self {
            schema: Arc::clone(&schema),
            attributes: Attributes::new(),
            tracker: ChangeTracker::new(),
            new_record: true,
        };

        document.attributes.insert(
            schema.discriminator_key(),
            Bson::String(schema.discriminator_value().to_string()),
        );
        document.apply_defaults(&schema, true)?;
        document.assign_attributes(attributes)?;
        document.apply_defaults(&schema, false)?;

        Ok(document)
    }

    /// Wraps a document loaded from storage. Nothing is tracked as changed.
    pub fn from_storage(schema: Arc<Schema>, raw: BsonDocument) -> Self {
        Self {
            schema,
            attributes: Attributes::from(raw),
            tracker: ChangeTracker::new(),
            new_record: false,
        }
    }

    /// Schema of the model this document was created as.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.schema.model_name()
    }

    /// Collection the document is persisted in, shared along the inheritance chain.
    pub fn collection_name(&self) -> &str {
        self.schema.collection_name()
    }

    /// Raw identity value.
    pub fn id(&self) -> Option<&Bson> {
        self.attributes.get(ID_KEY)
    }

    /// Discriminator recorded when the document was created.
    pub fn discriminator(&self) -> Option<&str> {
        self.attributes
            .get(self.schema.discriminator_key())
            .and_then(Bson::as_str)
    }

    /// True until the first checkpoint.
    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    /// True once a checkpoint has happened or when loaded from storage.
    pub fn is_persisted(&self) -> bool {
        !self.new_record
    }

    fn apply_defaults(&mut self, schema: &Schema, pre_processed: bool) -> DocumentResult<()> {
        for field in schema
            .fields()
            .filter(|field| field.is_pre_processed() == pre_processed)
        {
            if self.attributes.contains(field.storage_key()) {
                continue;
            }
            if let Some(stored) = self.default_for(field)? {
                self.attributes.insert(field.storage_key(), stored);
            }
        }

        Ok(())
    }

    /// Stored form of the field's default, or `None` if it has none.
    fn default_for(&self, field: &FieldDescriptor) -> DocumentResult<Option<Bson>> {
        let value = match field.default() {
            None => return Ok(None),
            Some(DefaultValue::Static(value)) => value.clone(),
            Some(DefaultValue::Computed(compute)) => compute(self)
                .map_err(|err| DocumentError::Default(field.name().to_string(), err.to_string()))?,
        };

        let stored = if field.is_localized() {
            match value {
                Bson::Document(translations) => field.mongoize_translations(translations)?,
                other => field.mongoize_translation(other, None, &self.schema.locales().locale())?,
            }
        } else {
            field.mongoize(value)?
        };

        Ok(Some(stored).filter(|stored| !matches!(stored, Bson::Null)))
    }

    fn materialize_default(&mut self, field: &FieldDescriptor) -> DocumentResult<()> {
        if !self.attributes.contains(field.storage_key()) {
            if let Some(stored) = self.default_for(field)? {
                self.attributes.insert(field.storage_key(), stored);
            }
        }

        Ok(())
    }

    /// Application value of a raw value. Localized fields resolve the active locale chain.
    fn present(&self, field: &FieldDescriptor, raw: Option<&Bson>) -> DocumentResult<Bson> {
        let Some(raw) = raw else {
            return Ok(Bson::Null);
        };

        let raw = if field.is_localized() {
            match field.lookup_translation(raw, &self.schema.locale_chain()) {
                Some(translation) => translation,
                None => return Ok(Bson::Null),
            }
        } else {
            raw
        };

        Ok(field.demongoize(raw.clone())?)
    }

    fn is_writable(&self, field: &FieldDescriptor) -> bool {
        field.name() != self.schema.discriminator_key() && !(field.is_readonly() && !self.new_record)
    }

    fn check_writable(&self, field: &FieldDescriptor) -> DocumentResult<()> {
        if self.is_writable(field) {
            Ok(())
        } else {
            Err(DocumentError::ReadonlyAttribute(
                field.name().to_string(),
                self.schema.model_name().to_string(),
            ))
        }
    }

    /// Records and applies a raw write. `None` removes the attribute.
    fn store(&mut self, key: &str, value: Option<Bson>) {
        self.tracker
            .record(key, self.attributes.get(key), value.as_ref());
        self.attributes.put(key, value);
    }

    /// Stored default of an absent attribute, so a write starts from what a read would see.
    fn pending_default(&self, field: &FieldDescriptor) -> DocumentResult<Option<Bson>> {
        if self.attributes.contains(field.storage_key()) {
            Ok(None)
        } else {
            self.default_for(field)
        }
    }

    /// Materializes `default` untracked, then records and applies `stored`.
    fn replace(&mut self, field: &FieldDescriptor, default: Option<Bson>, stored: Bson) {
        if let Some(default) = default {
            self.attributes.insert(field.storage_key(), default);
        }
        self.store(field.storage_key(), Some(stored));
    }

    fn write_field(&mut self, field: &FieldDescriptor, value: Bson) -> DocumentResult<()> {
        let key = field.storage_key();
        let default = self.pending_default(field)?;
        let stored = if field.is_localized() {
            let locale = self.schema.locales().locale();
            let current = self.attributes.get(key).or(default.as_ref());
            field.mongoize_translation(value, current, &locale)?
        } else {
            field.mongoize(value)?
        };

        self.replace(field, default, stored);

        Ok(())
    }

    /// Reads the application value of a field, by name or storage key.
    ///
    /// An absent attribute with a default gets the default written into the attributes
    /// first. That write is not tracked as a change.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::UnknownAttribute`] if the field is not declared and the model is not dynamic
    /// - [`DocumentError::Default`] if a computed default fails
    /// - [`DocumentError::Coercion`] if the codec refuses the stored value
    pub fn get(&mut self, name: &str) -> DocumentResult<Bson> {
        let schema = Arc::clone(&self.schema);
        let field = resolve(&schema, name)?;

        self.materialize_default(&field)?;
        self.present(&field, self.attributes.get(field.storage_key()))
    }

    /// Like [`get`](Self::get), but computes a missing default without storing it.
    pub fn peek(&self, name: &str) -> DocumentResult<Bson> {
        let field = resolve(&self.schema, name)?;

        match self.attributes.get(field.storage_key()) {
            Some(raw) => self.present(&field, Some(raw)),
            None => {
                let default = self.default_for(&field)?;
                self.present(&field, default.as_ref())
            }
        }
    }

    /// Writes a single field, by name or storage key.
    ///
    /// An absent attribute with a default has the default materialized first, untracked, so
    /// a localized write merges into the default translations and the recorded change starts
    /// from the default. A failed coercion leaves the document exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::UnknownAttribute`] if the field is not declared and the model is not dynamic
    /// - [`DocumentError::Default`] if a computed default fails
    /// - [`DocumentError::ReadonlyAttribute`] if the field is readonly and the document is persisted,
    ///   or if the field is the discriminator
    /// - [`DocumentError::Coercion`] if the codec refuses the value
    pub fn set(&mut self, name: &str, value: impl Into<Bson>) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = resolve(&schema, name)?;

        self.check_writable(&field)?;
        self.write_field(&field, value.into())
    }

    /// Reads a field and deserializes its application value.
    pub fn read<T: DeserializeOwned>(&mut self, name: &str) -> DocumentResult<T> {
        Ok(deserialize_from_bson(self.get(name)?)?)
    }

    /// Serializes `value` and writes it to a field.
    pub fn write<T: Serialize>(&mut self, name: &str, value: &T) -> DocumentResult<()> {
        self.set(name, serialize_to_bson(value)?)
    }

    /// All translations of a localized field, as application values keyed by locale.
    pub fn translations(&mut self, name: &str) -> DocumentResult<BsonDocument> {
        let schema = Arc::clone(&self.schema);
        let field = resolve_localized(&schema, name)?;

        self.materialize_default(field)?;

        let mut translations = BsonDocument::new();
        if let Some(Bson::Document(stored)) = self.attributes.get(field.storage_key()) {
            for (locale, value) in stored {
                translations.insert(locale.clone(), field.demongoize(value.clone())?);
            }
        }

        Ok(translations)
    }

    /// Replaces every translation of a localized field.
    pub fn set_translations(&mut self, name: &str, translations: BsonDocument) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = resolve_localized(&schema, name)?;

        self.check_writable(field)?;
        let default = self.pending_default(field)?;
        let stored = field.mongoize_translations(translations)?;
        self.replace(field, default, stored);

        Ok(())
    }

    /// Raw attributes keyed by storage key.
    pub fn attributes(&self) -> &BsonDocument {
        self.attributes.as_document()
    }

    /// Raw value of a field, by name or storage key.
    pub fn raw(&self, name_or_key: &str) -> Option<&Bson> {
        self.attributes.get(self.storage_key(name_or_key))
    }

    /// True if the attribute is present, even when its value is `Null`.
    pub fn has_attribute(&self, name_or_key: &str) -> bool {
        self.raw(name_or_key).is_some()
    }

    /// Removes an attribute. The removal is tracked like any other write.
    pub fn remove(&mut self, name: &str) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = resolve(&schema, name)?;

        self.check_writable(&field)?;
        if self.attributes.contains(field.storage_key()) {
            self.store(field.storage_key(), None);
        }

        Ok(())
    }

    /// Writes several fields at once, keyed by field name.
    ///
    /// Readonly fields of a persisted document and the discriminator are skipped silently.
    /// A key of the form `<name>_translations` replaces every translation of a localized
    /// field. If any write fails, none of them is applied.
    pub fn assign_attributes(&mut self, attributes: BsonDocument) -> DocumentResult<()> {
        let attributes_before = self.attributes.clone();
        let tracker_before = self.tracker.clone();

        for (name, value) in attributes {
            if let Err(err) = self.assign(&name, value) {
                self.attributes = attributes_before;
                self.tracker = tracker_before;
                return Err(err);
            }
        }

        Ok(())
    }

    fn assign(&mut self, name: &str, value: Bson) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);

        if let (Some(base), Bson::Document(translations)) = (name.strip_suffix(TRANSLATIONS_SUFFIX), &value) {
            if let Some(field) = schema.resolve(base).filter(|field| field.is_localized()) {
                if !self.is_writable(field) {
                    warn!("ignoring write to readonly attribute '{base}' on model {}", schema.model_name());
                    return Ok(());
                }

                let default = self.pending_default(field)?;
                let stored = field.mongoize_translations(translations.clone())?;
                self.replace(field, default, stored);
                return Ok(());
            }
        }

        let field = resolve(&schema, name)?;
        if field.name() == schema.discriminator_key() {
            debug!("ignoring assignment of discriminator on model {}", schema.model_name());
            return Ok(());
        }
        if !self.is_writable(&field) {
            warn!("ignoring write to readonly attribute '{name}' on model {}", schema.model_name());
            return Ok(());
        }

        self.write_field(&field, value)
    }

    fn storage_key<'a>(&'a self, name_or_key: &'a str) -> &'a str {
        self.schema
            .resolve(name_or_key)
            .map(FieldDescriptor::storage_key)
            .unwrap_or(name_or_key)
    }

    fn field_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.schema
            .field_by_storage_key(key)
            .map(FieldDescriptor::name)
            .unwrap_or(key)
    }

    fn keyed_by_name(&self, changes: IndexMap<String, Change>) -> IndexMap<String, Change> {
        changes
            .into_iter()
            .map(|(key, change)| (self.field_name(&key).to_string(), change))
            .collect()
    }

    /// True if any field changed since the last checkpoint.
    pub fn changed(&self) -> bool {
        self.tracker.is_changed()
    }

    /// Names of the changed fields, in first-write order.
    pub fn changed_fields(&self) -> Vec<String> {
        self.tracker
            .keys()
            .map(|key| self.field_name(key).to_string())
            .collect()
    }

    /// Raw `(old, new)` pairs keyed by field name.
    pub fn changes(&self) -> IndexMap<String, Change> {
        self.keyed_by_name(self.tracker.changes(&self.attributes))
    }

    /// Changes of the last checkpoint, keyed by field name.
    pub fn previous_changes(&self) -> IndexMap<String, Change> {
        self.keyed_by_name(self.tracker.previous().clone())
    }

    /// True if the field, by name or storage key, changed since the last checkpoint.
    pub fn field_changed(&self, name: &str) -> bool {
        self.tracker.is_tracked(self.storage_key(name))
    }

    /// Raw `(old, new)` pair of one field, or `None` if it did not change.
    pub fn field_change(&self, name: &str) -> Option<Change> {
        let key = self.storage_key(name);

        self.tracker
            .original(key)
            .map(|old| Change::new(old.clone(), self.attributes.get(key).cloned()))
    }

    /// Application value the field had at the last checkpoint.
    pub fn field_was(&self, name: &str) -> DocumentResult<Bson> {
        let field = resolve(&self.schema, name)?;

        match self.tracker.original(field.storage_key()) {
            Some(original) => self.present(&field, original.as_ref()),
            None => self.peek(name),
        }
    }

    /// Restores the value the field had at the last checkpoint and stops tracking it.
    pub fn reset_field(&mut self, name: &str) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = resolve(&schema, name)?;

        if let Some(original) = self.tracker.forget(field.storage_key()) {
            self.attributes.put(field.storage_key(), original);
        }

        Ok(())
    }

    /// Writes the field's default, or removes the attribute if it has none.
    pub fn reset_field_to_default(&mut self, name: &str) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = resolve(&schema, name)?;

        let default = self.default_for(&field)?;
        self.store(field.storage_key(), default);

        Ok(())
    }

    /// Checkpoint: moves the current changes into the previous changes.
    ///
    /// Called by the persistence layer after a successful write.
    pub fn commit_changes(&mut self) {
        debug!(
            "committing {} change(s) on {} {:?}",
            self.changed_fields().len(),
            self.schema.model_name(),
            self.id()
        );

        self.tracker.commit(&self.attributes);
        self.new_record = false;
    }

    /// `$set`/`$unset` update document for the current changes, keyed by storage key.
    pub fn atomic_updates(&self) -> BsonDocument {
        let mut set = BsonDocument::new();
        let mut unset = BsonDocument::new();

        for (key, change) in self.tracker.changes(&self.attributes) {
            match change.new {
                Some(value) => {
                    set.insert(key, value);
                }
                None => {
                    unset.insert(key, "");
                }
            }
        }

        let mut updates = BsonDocument::new();
        if !set.is_empty() {
            updates.insert("$set", set);
        }
        if !unset.is_empty() {
            updates.insert("$unset", unset);
        }

        updates
    }

    /// Checks the validations declared on the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Validation`] listing every failed rule.
    pub fn validate(&mut self) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let mut failures = Vec::new();

        for validation in schema.validations() {
            match validation {
                Validation::Presence(name) => {
                    if is_blank(&self.get(name)?) {
                        failures.push(format!("{name} can't be blank"));
                    }
                }
                Validation::Length { field, min, max } => {
                    let length = match self.get(field)? {
                        Bson::String(text) => text.chars().count(),
                        Bson::Array(items) => items.len(),
                        Bson::Null => 0,
                        _ => continue,
                    };

                    if min.is_some_and(|min| length < min) {
                        failures.push(format!("{field} is too short (minimum is {})", min.unwrap_or_default()));
                    }
                    if max.is_some_and(|max| length > max) {
                        failures.push(format!("{field} is too long (maximum is {})", max.unwrap_or_default()));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::Validation(failures))
        }
    }

    /// Application values of every declared field, keyed by field name.
    ///
    /// Undeclared attributes of a dynamic model are included as stored.
    pub fn to_application(&mut self) -> DocumentResult<BsonDocument> {
        let schema = Arc::clone(&self.schema);
        let mut values = BsonDocument::new();

        for field in schema.fields() {
            values.insert(field.name(), self.get(field.name())?);
        }

        if schema.is_dynamic() {
            for (key, value) in self.attributes.as_document() {
                if schema.field_by_storage_key(key).is_none() {
                    values.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(values)
    }

    /// Deserializes the application values into a typed model.
    pub fn to_model<T: DeserializeOwned>(&mut self) -> DocumentResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.to_application()?))?)
    }

    /// Bulk-assigns the serialized fields of a typed model. Null values are skipped.
    pub fn assign_model<T: Serialize>(&mut self, model: &T) -> DocumentResult<()> {
        match serialize_to_bson(model)? {
            Bson::Document(values) => self.assign_attributes(
                values
                    .into_iter()
                    .filter(|(_, value)| !matches!(value, Bson::Null))
                    .collect(),
            ),
            other => Err(DocumentError::Serialization(format!(
                "expected a document, got {other}"
            ))),
        }
    }

    /// Raw attributes rendered as JSON.
    pub fn as_json(&self) -> DocumentResult<Value> {
        Ok(to_value(self.attributes.as_document())?)
    }
}
