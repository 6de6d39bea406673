//! Main docmodel crate: typed, tracked documents over schemaless BSON storage.
//!
//! This crate is the entry point for users of docmodel. It re-exports the mapping core,
//! the [`accessors!`] macro and the in-memory backend.
//!
//! # Features
//!
//! - **Declared fields** - type codecs, storage-key aliases, static and computed defaults
//! - **Dirty tracking** - per-field changes, checkpoints and `$set`/`$unset` updates
//! - **Inheritance** - subtypes share a collection and are told apart by a discriminator
//! - **Localization** - per-locale values with fallback chains
//! - **Pluggable storage** - any [`backend::StoreBackend`], with an in-memory one included
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentResult<()> {
//!     let mut models = ModelRegistry::default();
//!     let person = models
//!         .schema("Person")
//!         .field("name", FieldOptions::typed("string").as_key("n"))?
//!         .field("age", FieldOptions::typed("integer").default_value(0))?;
//!     models.register(person)?;
//!
//!     let store = DocumentStore::new(InMemoryStore::new(), Arc::new(models));
//!
//!     let mut ada = store.models().new_document("Person")?;
//!     ada.set("name", "Ada")?;
//!     store.save(&mut ada).await?;
//!
//!     ada.set("age", 36)?;
//!     assert_eq!(ada.atomic_updates(), bson::doc! { "$set": { "age": 36 } });
//!     store.save(&mut ada).await?;
//!
//!     let adults = store
//!         .query(store.models().criteria("Person")?.where_op("age", FieldOp::Gte, 18)?)
//!         .await?;
//!     println!("{} adult(s)", adults.len());
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Inheritance
//!
//! ```ignore
//! let animal = models.schema("Animal").field("name", FieldOptions::typed("string"))?;
//! models.register(animal)?;
//!
//! let dog = models.extend("Animal", "Dog")?.field("breed", FieldOptions::typed("string"))?;
//! models.register(dog)?;
//!
//! // Loads a Dog, because the stored `_type` says so.
//! let rex = store.find("Animal", id).await?;
//! assert_eq!(rex.model_name(), "Dog");
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-memory storage for development and testing

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod prelude;

pub use docmodel_core::{
    attributes, backend, changes, codec, config, criteria, document, error, field, i18n, model, query, schema, store,
};
pub use docmodel_macros::accessors;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}
