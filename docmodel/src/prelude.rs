//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    changes::Change,
    codec::{Codec, CodecRef, CodecRegistry},
    config::{Config, I18nConfig},
    criteria::Criteria,
    document::Document,
    error::{CoercionError, DocumentError, DocumentResult, SchemaError},
    field::{DefaultValue, FieldDescriptor, FieldOptions, Localization},
    i18n::{I18n, LocaleProvider},
    model::ModelRegistry,
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    schema::{IndexSpec, Schema, SchemaBuilder, Validation},
    store::DocumentStore,
};
pub use docmodel_macros::accessors;
