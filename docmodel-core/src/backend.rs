//! Storage backend abstraction.
//!
//! The mapping core performs no I/O. A [`StoreBackend`] receives stored-form documents,
//! atomic update documents and [`Query`]s, and returns stored-form documents. Backends are
//! shared between tasks and must be `Send + Sync`.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the storage operations
//! - [`DynStoreBackend`]: object-safe mirror of [`StoreBackend`] for dynamic dispatch
//! - [`StoreBackendBuilder`]: factory for backend instances

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentResult, query::Query};

/// Storage operations a backend provides.
///
/// Every operation is scoped to one collection. Ids are raw `_id` values; documents and
/// updates are in stored form, keyed by storage key.
///
/// # Example
///
/// ```ignore
/// use docmodel_core::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// backend.insert_documents(vec![(Bson::Int32(1), doc! { "_id": 1, "n": "Ada" })], "people").await?;
/// backend.update_documents(vec![(Bson::Int32(1), doc! { "$set": { "n": "Grace" } })], "people").await?;
/// ```
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts whole documents, keyed by their `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DocumentAlreadyExists`](crate::error::DocumentError::DocumentAlreadyExists)
    /// if an id is already taken. No document of the batch is inserted in that case.
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()>;

    /// Applies `$set`/`$unset` update documents to existing documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DocumentNotFound`](crate::error::DocumentError::DocumentNotFound)
    /// if an id does not exist. A batch that fails leaves every document as it was.
    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()>;

    /// Deletes documents by id. Ids that do not exist are ignored.
    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()>;

    /// Fetches documents by id, in the order of `ids`. Missing ids are skipped.
    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>>;

    /// Runs a query. Field names in the filter and sort are storage keys or dotted paths.
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>>;

    /// Releases the backend's resources. The default does nothing.
    async fn shutdown(self) -> DocumentResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        B::insert_documents(*self, documents, collection).await
    }

    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        B::update_documents(*self, updates, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()> {
        B::delete_documents(*self, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        B::get_documents(*self, ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        B::query_documents(*self, query, collection).await
    }
}

/// Object-safe version of [`StoreBackend`], implemented for every backend.
///
/// `Box<dyn DynStoreBackend>` implements [`StoreBackend`] itself, so a
/// [`DocumentStore`](crate::store::DocumentStore) can pick its backend at runtime.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    /// See [`StoreBackend::insert_documents`].
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()>;
    /// See [`StoreBackend::update_documents`].
    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()>;
    /// See [`StoreBackend::delete_documents`].
    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()>;
    /// See [`StoreBackend::get_documents`].
    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>>;
    /// See [`StoreBackend::query_documents`].
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>>;
    /// [`StoreBackend::shutdown`] for a boxed backend.
    async fn shutdown_boxed(self: Box<Self>) -> DocumentResult<()>;

    /// Concrete backend, for downcasting.
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        StoreBackend::update_documents(self, updates, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        self.as_ref().insert_documents(documents, collection).await
    }

    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        self.as_ref().update_documents(updates, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()> {
        self.as_ref().delete_documents(ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        self.as_ref().get_documents(ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        self.as_ref().query_documents(query, collection).await
    }

    async fn shutdown(self) -> DocumentResult<()> {
        self.shutdown_boxed().await
    }
}

/// Constructs a backend, possibly connecting to something first.
#[async_trait]
pub trait StoreBackendBuilder {
    /// Backend this builder produces.
    type Backend: StoreBackend;

    /// Consumes the builder and returns a ready backend.
    async fn build(self) -> DocumentResult<Self::Backend>;
}
