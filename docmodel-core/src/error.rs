//! Error types and result types for the mapping core.
//!
//! Errors are split by when they can happen:
//!
//! - [`SchemaError`] is raised while models are being declared and is fatal for that model.
//! - [`CoercionError`] is raised by a codec that refuses a value.
//! - [`DocumentError`] is raised per call on a document or a store and wraps the other two.
//!
//! Use [`DocumentResult<T>`] as the return type for fallible document operations.

use bson::{Bson, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use std::convert::Infallible;
use thiserror::Error;

/// Errors raised while declaring fields, registering codecs or registering models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The field name collides with a reserved accessor name.
    #[error("Field name '{0}' is reserved")]
    ReservedName(String),
    /// A field with the same name is already declared on the model.
    /// The first argument is the field name, the second is the model name.
    #[error("Field '{0}' is already declared on model {1}")]
    DuplicateField(String, String),
    /// Another field already uses this storage key.
    /// The first argument is the storage key, the second is the model name.
    #[error("Storage key '{0}' is already used on model {1}")]
    DuplicateStorageKey(String, String),
    /// A codec is already registered under this type tag.
    #[error("A codec is already registered for type '{0}'")]
    DuplicateCodec(String),
    /// No codec is registered under this type tag.
    #[error("No codec registered for type '{0}'")]
    UnknownCodec(String),
    /// A model with this name is already registered.
    #[error("Model {0} is already registered")]
    DuplicateModel(String),
    /// Another model already uses this discriminator value.
    /// The first argument is the discriminator value, the second the model that owns it.
    #[error("Discriminator value '{0}' is already used by model {1}")]
    DuplicateDiscriminator(String, String),
    /// The named model has not been registered.
    #[error("Model {0} is not registered")]
    UnknownModel(String),
}

/// A codec refused to convert a value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot coerce {value} to {type_tag}: {reason}")]
pub struct CoercionError {
    /// Type tag of the codec that refused the value.
    pub type_tag: String,
    /// The offending value.
    pub value: Bson,
    /// Why the value was refused.
    pub reason: String,
}

impl CoercionError {
    pub fn new(type_tag: impl Into<String>, value: &Bson, reason: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            value: value.clone(),
            reason: reason.into(),
        }
    }
}

/// Represents all errors that can occur when working with documents and stores.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The model declaration is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The attribute is not declared and the model is not dynamic.
    /// The first argument is the attribute name, the second is the model name.
    #[error("Unknown attribute '{0}' on model {1}")]
    UnknownAttribute(String, String),
    /// The attribute cannot be written once the document has been persisted.
    /// The first argument is the attribute name, the second is the model name.
    #[error("Attribute '{0}' on model {1} is readonly")]
    ReadonlyAttribute(String, String),
    /// A codec refused a value.
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    /// A computed default failed while being evaluated.
    /// The first argument is the field name, the second is the failure.
    #[error("Default for field '{0}' failed: {1}")]
    Default(String, String),
    /// The document does not satisfy the validations declared on its model.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    /// Serialization error when converting between typed values and BSON or JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

impl From<BsonError> for DocumentError {
    fn from(err: BsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}

impl From<Infallible> for DocumentError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
