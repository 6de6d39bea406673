//! Field descriptors: the static metadata of one declared attribute.
//!
//! Descriptors are created by [`SchemaBuilder::field`](crate::schema::SchemaBuilder::field)
//! from a set of [`FieldOptions`] and are immutable afterwards. A descriptor knows how to
//! coerce values for its field, including the locale map of localized fields, but it never
//! holds per-document state.

use bson::{Bson, Document as BsonDocument};
use std::{fmt, sync::Arc};

use crate::{
    codec::{CodecRef, CodecResult},
    document::Document,
    error::DocumentResult,
};

/// A default evaluated against the document it is materialized on.
pub type ComputedDefault = Arc<dyn Fn(&Document) -> DocumentResult<Bson> + Send + Sync>;

/// Value a field takes when it has never been written.
#[derive(Clone)]
pub enum DefaultValue {
    /// Copied as-is into the attributes.
    Static(Bson),
    /// Evaluated on first access, or at construction when the field is pre-processed.
    Computed(ComputedDefault),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// How a field stores its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Localization {
    /// A single value.
    #[default]
    None,
    /// A map from locale to value.
    Localized,
    /// A map from locale to value that drops blank values instead of storing them.
    LocalizedPresent,
}

/// Options accepted when declaring a field.
///
/// # Example
///
/// ```ignore
/// use docmodel_core::field::FieldOptions;
///
/// let options = FieldOptions::typed("string")
///     .as_key("t")
///     .default_value("untitled")
///     .localize();
/// ```
#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub(crate) type_tag: Option<String>,
    pub(crate) storage_key: Option<String>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) pre_processed: bool,
    pub(crate) readonly: bool,
    pub(crate) localization: Localization,
    pub(crate) fallbacks: bool,
    pub(crate) overwrite: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            type_tag: None,
            storage_key: None,
            default: None,
            pre_processed: false,
            readonly: false,
            localization: Localization::None,
            fallbacks: true,
            overwrite: false,
        }
    }
}

impl FieldOptions {
    /// Options for an untyped field whose values are stored unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a field coerced by the codec registered under `type_tag`.
    pub fn typed(type_tag: impl Into<String>) -> Self {
        Self::new().of_type(type_tag)
    }

    pub fn of_type(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = Some(type_tag.into());
        self
    }

    /// Stores the field under `key` instead of its name.
    pub fn as_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Computes the default from the document being initialized.
    pub fn default_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Document) -> DocumentResult<Bson> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Materializes the default before any attribute is assigned at construction.
    pub fn pre_processed(mut self) -> Self {
        self.pre_processed = true;
        self
    }

    /// Rejects writes once the document has been persisted.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn localize(mut self) -> Self {
        self.localization = Localization::Localized;
        self
    }

    /// Like [`localize`](Self::localize), but blank values remove the translation.
    pub fn localize_present(mut self) -> Self {
        self.localization = Localization::LocalizedPresent;
        self
    }

    /// Enables or disables the locale fallback chain for a localized field.
    pub fn fallbacks(mut self, enabled: bool) -> Self {
        self.fallbacks = enabled;
        self
    }

    /// Replaces an existing declaration with the same name instead of failing.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }
}

/// Metadata of one declared attribute.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    storage_key: String,
    type_tag: Option<String>,
    codec: Option<CodecRef>,
    default: Option<DefaultValue>,
    pre_processed: bool,
    readonly: bool,
    localization: Localization,
    fallbacks: bool,
}

impl FieldDescriptor {
    pub(crate) fn new(name: String, options: FieldOptions, codec: Option<CodecRef>) -> Self {
        Self {
            storage_key: options.storage_key.unwrap_or_else(|| name.clone()),
            name,
            type_tag: options.type_tag,
            codec,
            default: options.default,
            pre_processed: options.pre_processed,
            readonly: options.readonly,
            localization: options.localization,
            fallbacks: options.fallbacks,
        }
    }

    /// Descriptor synthesized for an undeclared attribute of a dynamic model.
    pub(crate) fn dynamic(name: &str) -> Self {
        Self::new(name.to_string(), FieldOptions::new(), None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn is_aliased(&self) -> bool {
        self.name != self.storage_key
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_pre_processed(&self) -> bool {
        self.pre_processed
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn localization(&self) -> Localization {
        self.localization
    }

    pub fn is_localized(&self) -> bool {
        self.localization != Localization::None
    }

    pub fn uses_fallbacks(&self) -> bool {
        self.fallbacks
    }

    /// Converts an application value to its stored form. Untyped fields store values as-is.
    pub fn mongoize(&self, value: Bson) -> CodecResult {
        match &self.codec {
            Some(codec) => codec.mongoize(value),
            None => Ok(value),
        }
    }

    /// Rebuilds the application value from its stored form.
    pub fn demongoize(&self, value: Bson) -> CodecResult {
        match &self.codec {
            Some(codec) => codec.demongoize(value),
            None => Ok(value),
        }
    }

    /// Converts a query value to its stored form.
    pub fn evolve(&self, value: Bson) -> CodecResult {
        match &self.codec {
            Some(codec) => codec.evolve(value),
            None => Ok(value),
        }
    }

    /// Stores `value` at `locale` inside the existing translations map of a localized field.
    ///
    /// The existing map is copied, never mutated.
    pub fn mongoize_translation(&self, value: Bson, existing: Option<&Bson>, locale: &str) -> CodecResult {
        let mut translations = match existing {
            Some(Bson::Document(map)) => map.clone(),
            _ => BsonDocument::new(),
        };

        let stored = self.mongoize(value)?;
        if self.localization == Localization::LocalizedPresent && is_blank(&stored) {
            translations.remove(locale);
        } else {
            translations.insert(locale, stored);
        }

        Ok(Bson::Document(translations))
    }

    /// Converts a full `locale -> value` map to its stored form.
    pub fn mongoize_translations(&self, translations: BsonDocument) -> CodecResult {
        let mut stored = BsonDocument::new();

        for (locale, value) in translations {
            let value = self.mongoize(value)?;
            if self.localization == Localization::LocalizedPresent && is_blank(&value) {
                continue;
            }
            stored.insert(locale, value);
        }

        Ok(Bson::Document(stored))
    }

    /// Picks the stored value of the first locale in `chain` that has one.
    pub fn lookup_translation<'a>(&self, stored: &'a Bson, chain: &[String]) -> Option<&'a Bson> {
        let Bson::Document(translations) = stored else {
            return None;
        };

        let chain = if self.fallbacks { chain } else { &chain[..chain.len().min(1)] };
        chain
            .iter()
            .find_map(|locale| translations.get(locale).filter(|value| !matches!(value, Bson::Null)))
    }
}

/// Returns true for values `localize_present` fields refuse to store.
pub(crate) fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null => true,
        Bson::String(text) => text.trim().is_empty(),
        Bson::Array(items) => items.is_empty(),
        Bson::Document(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecRegistry, IntegerCodec};
    use crate::config::Config;
    use bson::doc;

    fn codecs() -> CodecRegistry {
        CodecRegistry::with_builtins(&Config::default())
    }

    #[test]
    fn storage_key_defaults_to_name() {
        let plain = FieldDescriptor::new("title".into(), FieldOptions::new(), None);
        let aliased = FieldDescriptor::new("title".into(), FieldOptions::new().as_key("t"), None);

        assert_eq!(plain.storage_key(), "title");
        assert!(!plain.is_aliased());
        assert_eq!(aliased.storage_key(), "t");
        assert!(aliased.is_aliased());
    }

    #[test]
    fn untyped_fields_pass_values_through() {
        let field = FieldDescriptor::dynamic("anything");

        assert_eq!(field.mongoize(Bson::String("7".into())).unwrap(), Bson::String("7".into()));
    }

    #[test]
    fn translation_is_merged_into_existing_map() {
        let field = FieldDescriptor::new(
            "count".into(),
            FieldOptions::typed(IntegerCodec::TAG).localize(),
            codecs().lookup(IntegerCodec::TAG),
        );
        let existing = Bson::Document(doc! { "en": 1 });

        assert_eq!(
            field.mongoize_translation(Bson::String("2".into()), Some(&existing), "de").unwrap(),
            Bson::Document(doc! { "en": 1, "de": 2 })
        );
    }

    #[test]
    fn localize_present_drops_blank_translations() {
        let field = FieldDescriptor::new(
            "title".into(),
            FieldOptions::typed("string").localize_present(),
            codecs().lookup("string"),
        );
        let existing = Bson::Document(doc! { "en": "Title", "de": "Titel" });

        assert_eq!(
            field.mongoize_translation(Bson::String("  ".into()), Some(&existing), "de").unwrap(),
            Bson::Document(doc! { "en": "Title" })
        );
        assert_eq!(
            field.mongoize_translations(doc! { "en": "", "es": "Título" }).unwrap(),
            Bson::Document(doc! { "es": "Título" })
        );
    }

    #[test]
    fn lookup_walks_the_chain() {
        let field = FieldDescriptor::new("title".into(), FieldOptions::new().localize(), None);
        let stored = Bson::Document(doc! { "en": "Marvelous!", "es": "Maravilloso!" });
        let chain = vec!["de".to_string(), "en".to_string(), "es".to_string()];

        assert_eq!(field.lookup_translation(&stored, &chain), Some(&Bson::String("Marvelous!".into())));
    }

    #[test]
    fn lookup_without_fallbacks_only_checks_first_locale() {
        let field = FieldDescriptor::new("title".into(), FieldOptions::new().localize().fallbacks(false), None);
        let stored = Bson::Document(doc! { "en": "Marvelous!" });
        let chain = vec!["de".to_string(), "en".to_string()];

        assert_eq!(field.lookup_translation(&stored, &chain), None);
    }
}
