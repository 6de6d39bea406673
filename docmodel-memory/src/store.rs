//! In-memory storage implementation.
//!
//! Collections are maps from document id to stored-form document, kept in insertion order
//! behind an async-aware read-write lock.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use indexmap::IndexMap;
use log::debug;
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentError, DocumentResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

type CollectionMap = IndexMap<String, BsonDocument>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// Clones share the same data. Queries scan every document of the collection.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![(Bson::Int32(1), doc! { "_id": 1, "n": "Ada" })], "people").await?;
///
/// let docs = store.get_documents(vec![Bson::Int32(1)], "people").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document key -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the collections that hold at least one document.
    pub async fn collections(&self) -> Vec<String> {
        self.store
            .read()
            .await
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of documents stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, IndexMap::len)
    }
}

/// Map key of a document id. The display form keeps ids of different BSON types apart.
fn id_key(id: &Bson) -> String {
    id.to_string()
}

/// Applies one `$set`/`$unset` update document. Keys may be dotted paths.
fn apply_update(document: &mut BsonDocument, update: &BsonDocument) -> DocumentResult<()> {
    for (operator, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(DocumentError::Backend(format!("{operator} expects a document")));
        };

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(document, path, value.clone())?;
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    unset_path(document, path);
                }
            }
            other => return Err(DocumentError::Backend(format!("unsupported update operator {other}"))),
        }
    }

    Ok(())
}

fn set_path(document: &mut BsonDocument, path: &str, value: Bson) -> DocumentResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(BsonDocument::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(DocumentError::Backend(format!("cannot set {path}: {head} is not a document"))),
            }
        }
    }
}

fn unset_path(document: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store.entry(collection.to_string()).or_default();

        for (id, _) in &documents {
            if collection_map.contains_key(&id_key(id)) {
                return Err(DocumentError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
            }
        }

        debug!("inserting {} document(s) into {collection}", documents.len());
        for (id, document) in documents {
            collection_map.insert(id_key(&id), document);
        }

        Ok(())
    }

    async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, collection: &str) -> DocumentResult<()> {
        let mut store = self.store.write().await;
        let not_found = |id: &Bson| DocumentError::DocumentNotFound(id.to_string(), collection.to_string());

        let Some(collection_map) = store.get_mut(collection) else {
            return match updates.first() {
                Some((id, _)) => Err(not_found(id)),
                None => Ok(()),
            };
        };

        // Staged so a failing update leaves every document untouched.
        let mut staged = CollectionMap::new();
        for (id, update) in &updates {
            let key = id_key(id);
            let mut updated = staged
                .get(&key)
                .or_else(|| collection_map.get(&key))
                .cloned()
                .ok_or_else(|| not_found(id))?;

            apply_update(&mut updated, update)?;
            staged.insert(key, updated);
        }

        debug!("updating {} document(s) in {collection}", staged.len());
        for (key, document) in staged {
            collection_map.insert(key, document);
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<()> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(());
        };

        for id in ids {
            if collection_map.shift_remove(&id_key(&id)).is_some() {
                debug!("deleted {id} from {collection}");
            }
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection_map.get(&id_key(id)))
            .cloned()
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentResult<Vec<BsonDocument>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter),
            None => collection_map.values().cloned().collect(),
        };

        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| {
                let left = lookup(a, &sort.field).map_or(Comparable::Null, Comparable::from);
                let right = lookup(b, &sort.field).map_or(Comparable::Null, Comparable::from);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        Ok(documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    #[tokio::test]
    async fn inserts_are_all_or_nothing() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![(Bson::Int32(1), doc! { "_id": 1 })], "people")
            .await
            .unwrap();

        let result = store
            .insert_documents(
                vec![(Bson::Int32(2), doc! { "_id": 2 }), (Bson::Int32(1), doc! { "_id": 1 })],
                "people",
            )
            .await;

        assert!(matches!(result, Err(DocumentError::DocumentAlreadyExists(..))));
        assert_eq!(store.count("people").await, 1);
    }

    #[tokio::test]
    async fn ids_of_different_types_do_not_collide() {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![(Bson::Int32(1), doc! { "_id": 1 }), (Bson::from("1"), doc! { "_id": "1" })],
                "people",
            )
            .await
            .unwrap();

        assert_eq!(store.count("people").await, 2);
    }

    #[tokio::test]
    async fn updates_apply_set_and_unset_paths() {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![(Bson::Int32(1), doc! { "_id": 1, "n": "Ada", "title": { "en": "Hi" }, "age": 3 })],
                "people",
            )
            .await
            .unwrap();

        store
            .update_documents(
                vec![(
                    Bson::Int32(1),
                    doc! { "$set": { "n": "Grace", "title.de": "Hallo" }, "$unset": { "age": true } },
                )],
                "people",
            )
            .await
            .unwrap();

        let stored = store.get_documents(vec![Bson::Int32(1)], "people").await.unwrap();
        assert_eq!(
            stored,
            vec![doc! { "_id": 1, "n": "Grace", "title": { "en": "Hi", "de": "Hallo" } }]
        );
    }

    #[tokio::test]
    async fn updates_are_all_or_nothing() {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![(Bson::Int32(1), doc! { "_id": 1, "n": "Ada" }), (Bson::Int32(2), doc! { "_id": 2, "n": "Bob" })],
                "people",
            )
            .await
            .unwrap();

        let result = store
            .update_documents(
                vec![
                    (Bson::Int32(1), doc! { "$set": { "n": "Grace" } }),
                    (Bson::Int32(2), doc! { "$set": { "n.first": "Robert" } }),
                ],
                "people",
            )
            .await;

        assert!(matches!(result, Err(DocumentError::Backend(_))));
        let stored = store
            .get_documents(vec![Bson::Int32(1), Bson::Int32(2)], "people")
            .await
            .unwrap();
        assert_eq!(stored, vec![doc! { "_id": 1, "n": "Ada" }, doc! { "_id": 2, "n": "Bob" }]);
    }

    #[tokio::test]
    async fn updating_a_missing_document_fails() {
        let store = InMemoryStore::new();
        let result = store
            .update_documents(vec![(Bson::Int32(9), doc! { "$set": { "n": "x" } })], "people")
            .await;

        assert!(matches!(result, Err(DocumentError::DocumentNotFound(..))));
    }

    #[tokio::test]
    async fn queries_filter_sort_and_paginate() {
        let store = InMemoryStore::builder().build().await.unwrap();
        let people = (1..=5)
            .map(|i| (Bson::Int32(i), doc! { "_id": i, "age": i * 10 }))
            .collect();
        store.insert_documents(people, "people").await.unwrap();

        let query = Query::builder()
            .filter(Filter::gte("age", 20))
            .sort("age", SortDirection::Desc)
            .offset(1)
            .limit(2)
            .build();
        let found = store.query_documents(query, "people").await.unwrap();

        let ages: Vec<i32> = found.iter().filter_map(|doc| doc.get_i32("age").ok()).collect();
        assert_eq!(ages, vec![40, 30]);
    }

    #[tokio::test]
    async fn deletes_remove_documents() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![(Bson::Int32(1), doc! { "_id": 1 })], "people")
            .await
            .unwrap();

        store.delete_documents(vec![Bson::Int32(1)], "people").await.unwrap();

        assert!(store.get_documents(vec![Bson::Int32(1)], "people").await.unwrap().is_empty());
        assert!(store.collections().await.is_empty());
    }
}
