//! The model registry: declared models, the codecs they use and the locale provider.
//!
//! A [`ModelRegistry`] is filled once at start-up and read concurrently afterwards. It is the
//! factory for [`Document`]s, both new and loaded from storage, and for [`Criteria`].

use bson::{Bson, Document as BsonDocument};
use indexmap::IndexMap;
use log::debug;
use std::{collections::HashMap, sync::Arc};

use crate::{
    codec::{CodecRef, CodecRegistry},
    config::Config,
    criteria::Criteria,
    document::Document,
    error::{DocumentResult, SchemaError},
    i18n::{I18n, LocaleProvider},
    schema::{Schema, SchemaBuilder},
};

#[derive(Debug)]
pub struct ModelRegistry {
    config: Config,
    codecs: Arc<CodecRegistry>,
    i18n: Arc<I18n>,
    models: IndexMap<String, Arc<Schema>>,
    // (root model, discriminator value) -> model name
    discriminators: HashMap<(String, String), String>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ModelRegistry {
    /// Creates a registry holding the built-in codecs configured by `config`.
    pub fn new(config: Config) -> Self {
        Self {
            codecs: Arc::new(CodecRegistry::with_builtins(&config)),
            i18n: Arc::new(I18n::new(&config.i18n)),
            config,
            models: IndexMap::new(),
            discriminators: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// The locale provider shared by every registered schema.
    pub fn i18n(&self) -> &Arc<I18n> {
        &self.i18n
    }

    /// Registers a custom codec. Must happen before the models using it are declared.
    pub fn register_codec(&mut self, tag: impl Into<String>, codec: CodecRef) -> Result<(), SchemaError> {
        Arc::make_mut(&mut self.codecs).register(tag, codec)
    }

    /// Starts the declaration of a root model.
    pub fn schema(&self, model_name: &str) -> SchemaBuilder {
        let locales: Arc<dyn LocaleProvider> = self.i18n.clone();

        SchemaBuilder::root(
            model_name,
            &self.config.discriminator_key,
            Arc::clone(&self.codecs),
            locales,
        )
    }

    /// Starts the declaration of a subtype of the registered model `parent`.
    pub fn extend(&self, parent: &str, model_name: &str) -> Result<SchemaBuilder, SchemaError> {
        let parent = self.require(parent)?;

        Ok(SchemaBuilder::extend(parent, model_name, Arc::clone(&self.codecs)))
    }

    /// Finishes a declaration and makes the model available.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::DuplicateModel`] if a model with the same name is registered
    /// - [`SchemaError::DuplicateDiscriminator`] if another model of the hierarchy uses the
    ///   same discriminator value
    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<Schema>, SchemaError> {
        let schema = builder.build();
        let name = schema.model_name().to_string();

        if self.models.contains_key(&name) {
            return Err(SchemaError::DuplicateModel(name));
        }

        let discriminator = (root_name(&schema).to_string(), schema.discriminator_value().to_string());
        if let Some(owner) = self.discriminators.get(&discriminator) {
            return Err(SchemaError::DuplicateDiscriminator(discriminator.1, owner.clone()));
        }

        debug!(
            "registered model {name} with {} field(s) in collection {}",
            schema.fields().count(),
            schema.collection_name()
        );

        let schema = Arc::new(schema);
        self.discriminators.insert(discriminator, name.clone());
        self.models.insert(name, Arc::clone(&schema));

        Ok(schema)
    }

    pub fn model(&self, model_name: &str) -> Option<&Arc<Schema>> {
        self.models.get(model_name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.models.values()
    }

    fn require(&self, model_name: &str) -> Result<&Arc<Schema>, SchemaError> {
        self.models
            .get(model_name)
            .ok_or_else(|| SchemaError::UnknownModel(model_name.to_string()))
    }

    /// Every registered model extending `model_name`, at any depth.
    pub fn descendants(&self, model_name: &str) -> Vec<&Arc<Schema>> {
        self.models
            .values()
            .filter(|schema| schema.ancestors().iter().any(|ancestor| ancestor == model_name))
            .collect()
    }

    /// The model of `base`'s hierarchy whose discriminator value is `value`.
    pub fn by_discriminator(&self, base: &Schema, value: &str) -> Option<&Arc<Schema>> {
        self.discriminators
            .get(&(root_name(base).to_string(), value.to_string()))
            .and_then(|name| self.models.get(name))
    }

    /// Creates a new document of a registered model.
    pub fn new_document(&self, model_name: &str) -> DocumentResult<Document> {
        Document::new(Arc::clone(self.require(model_name)?))
    }

    /// Creates a new document and bulk-assigns `attributes`.
    pub fn build_document(&self, model_name: &str, attributes: BsonDocument) -> DocumentResult<Document> {
        Document::with_attributes(Arc::clone(self.require(model_name)?), attributes)
    }

    /// Wraps a stored document in the most derived model its discriminator names.
    ///
    /// Falls back to `model_name` when the discriminator is missing, unknown or names a model
    /// outside `model_name`'s subtree.
    pub fn instantiate(&self, model_name: &str, raw: BsonDocument) -> DocumentResult<Document> {
        let base = self.require(model_name)?;
        let schema = raw
            .get(base.discriminator_key())
            .and_then(Bson::as_str)
            .and_then(|value| self.by_discriminator(base, value))
            .filter(|schema| schema.is_kind_of(base.model_name()))
            .unwrap_or(base);

        Ok(Document::from_storage(Arc::clone(schema), raw))
    }

    /// Starts a query over a registered model and its subtypes.
    pub fn criteria(&self, model_name: &str) -> DocumentResult<Criteria> {
        let schema = self.require(model_name)?;
        let descendants = self.descendants(model_name);

        let discriminators = if schema.parent_name().is_none() && descendants.is_empty() {
            None
        } else {
            Some(
                std::iter::once(schema)
                    .chain(descendants)
                    .map(|schema| schema.discriminator_value().to_string())
                    .collect(),
            )
        };

        Ok(Criteria::new(Arc::clone(schema), discriminators))
    }
}

fn root_name(schema: &Schema) -> &str {
    schema
        .ancestors()
        .last()
        .map(String::as_str)
        .unwrap_or(schema.model_name())
}
