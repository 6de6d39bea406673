//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! tests and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - concurrent reads and writes behind an async-aware RwLock
//! - **Stored-form documents** - documents are kept exactly as the mapping core produced them
//! - **Atomic updates** - `$set`/`$unset` update documents with dotted paths
//! - **Query support** - filtering on dotted paths, sorting and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{field::FieldOptions, memory::InMemoryStore, model::ModelRegistry, store::DocumentStore};
//! use std::sync::Arc;
//!
//! let mut models = ModelRegistry::default();
//! let person = models.schema("Person").field("name", FieldOptions::typed("string"))?;
//! models.register(person)?;
//!
//! let store = DocumentStore::new(InMemoryStore::new(), Arc::new(models));
//! let mut ada = store.models().new_document("Person")?;
//! ada.set("name", "Ada")?;
//! store.save(&mut ada).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
