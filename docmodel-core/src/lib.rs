//! The mapping core of docmodel: typed, tracked documents on top of schemaless BSON storage.
//!
//! This crate provides:
//!
//! - **Type codecs** ([`codec`]) - conversions between application values and stored values
//! - **Fields and schemas** ([`field`], [`schema`]) - declarations, aliases, defaults, localization and inheritance
//! - **Model registry** ([`model`]) - declared models, codecs and locales, and the document factory
//! - **Documents** ([`document`]) - attribute access, coercion and dirty tracking ([`attributes`], [`changes`])
//! - **Localization** ([`i18n`]) - active locale and fallback chains
//! - **Queries** ([`criteria`], [`query`]) - application-level criteria and backend-neutral expressions
//! - **Persistence** ([`backend`], [`store`]) - the storage backend trait and the document store
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{field::FieldOptions, model::ModelRegistry};
//!
//! let mut models = ModelRegistry::default();
//! let person = models
//!     .schema("Person")
//!     .field("name", FieldOptions::typed("string").as_key("n"))?
//!     .field("age", FieldOptions::typed("integer").default_value(0))?;
//! models.register(person)?;
//!
//! let mut ada = models.new_document("Person")?;
//! ada.set("name", "Ada")?;
//!
//! assert_eq!(ada.attributes().get_str("n")?, "Ada");
//! assert!(ada.field_changed("name"));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod attributes;
pub mod backend;
pub mod changes;
pub mod codec;
pub mod config;
pub mod criteria;
pub mod document;
pub mod error;
pub mod field;
pub mod i18n;
pub mod model;
pub mod query;
pub mod schema;
pub mod store;
