//! The persistence collaborator: moves documents between a [`StoreBackend`] and the core.
//!
//! [`DocumentStore::save`] is where checkpoints happen. New documents are inserted whole;
//! persisted ones send only their [`atomic_updates`](Document::atomic_updates). After the
//! backend accepts the write, the document's changes are committed.

use bson::Bson;
use log::debug;
use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    criteria::{Criteria, describe},
    document::Document,
    error::{DocumentError, DocumentResult, SchemaError},
    model::ModelRegistry,
    schema::ID_FIELD,
};

#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    models: Arc<ModelRegistry>,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B, models: Arc<ModelRegistry>) -> Self {
        Self { backend, models }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    /// Validates and persists a document, then commits its changes.
    ///
    /// Saving a persisted document without changes does nothing.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Validation`] if a validation fails; nothing is written
    /// - any error of the backend; the document keeps its changes
    pub async fn save(&self, document: &mut Document) -> DocumentResult<()> {
        document.validate()?;

        let id = document
            .id()
            .cloned()
            .ok_or_else(|| DocumentError::Serialization(format!("{} has no identity", document.model_name())))?;
        let collection = document.collection_name().to_string();

        if document.is_new_record() {
            self.backend
                .insert_documents(vec![(id.clone(), document.attributes().clone())], &collection)
                .await?;
            debug!("inserted {} {id} into {collection}", document.model_name());
        } else {
            let updates = document.atomic_updates();
            if updates.is_empty() {
                return Ok(());
            }

            debug!("updating {} {id} in {collection} with {updates}", document.model_name());
            self.backend
                .update_documents(vec![(id, updates)], &collection)
                .await?;
        }

        document.commit_changes();

        Ok(())
    }

    /// Loads a document of `model_name`, or of one of its subtypes, by id.
    ///
    /// The id is evolved through the identity field, so a hex string finds an object id.
    pub async fn find(&self, model_name: &str, id: impl Into<Bson>) -> DocumentResult<Document> {
        let schema = self
            .models
            .model(model_name)
            .ok_or_else(|| SchemaError::UnknownModel(model_name.to_string()))?;
        let id = match schema.field(ID_FIELD) {
            Some(field) => field.evolve(id.into())?,
            None => id.into(),
        };
        let collection = schema.collection_name();

        let raw = self
            .backend
            .get_documents(vec![id.clone()], collection)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocumentError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        let document = self.models.instantiate(model_name, raw)?;
        let in_subtree = document
            .discriminator()
            .and_then(|value| self.models.by_discriminator(schema, value))
            .is_none_or(|stored| stored.is_kind_of(model_name));
        if !in_subtree {
            return Err(DocumentError::DocumentNotFound(id.to_string(), collection.to_string()));
        }

        Ok(document)
    }

    /// Runs a criteria and materializes every match into its most derived model.
    pub async fn query(&self, criteria: Criteria) -> DocumentResult<Vec<Document>> {
        let model_name = criteria.schema().model_name().to_string();
        let collection = criteria.collection_name().to_string();
        let query = criteria.into_query();

        if let Some(filter) = &query.filter {
            debug!("querying {collection} with {}", describe(filter));
        }

        self.backend
            .query_documents(query, &collection)
            .await?
            .into_iter()
            .map(|raw| self.models.instantiate(&model_name, raw))
            .collect()
    }

    /// Deletes a persisted document.
    pub async fn delete(&self, document: &Document) -> DocumentResult<()> {
        let id = document
            .id()
            .cloned()
            .ok_or_else(|| DocumentError::Serialization(format!("{} has no identity", document.model_name())))?;

        self.backend
            .delete_documents(vec![id], document.collection_name())
            .await
    }

    pub async fn shutdown(self) -> DocumentResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::FieldOptions, query::Query};
    use async_trait::async_trait;
    use bson::{Document as BsonDocument, doc};
    use std::sync::Mutex;

    /// Records every write it receives and serves nothing.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        inserts: Mutex<Vec<BsonDocument>>,
        updates: Mutex<Vec<BsonDocument>>,
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn insert_documents(&self, documents: Vec<(Bson, BsonDocument)>, _: &str) -> DocumentResult<()> {
            let mut inserts = self.inserts.lock().unwrap();
            inserts.extend(documents.into_iter().map(|(_, document)| document));
            Ok(())
        }

        async fn update_documents(&self, updates: Vec<(Bson, BsonDocument)>, _: &str) -> DocumentResult<()> {
            let mut recorded = self.updates.lock().unwrap();
            recorded.extend(updates.into_iter().map(|(_, update)| update));
            Ok(())
        }

        async fn delete_documents(&self, _: Vec<Bson>, _: &str) -> DocumentResult<()> {
            Ok(())
        }

        async fn get_documents(&self, _: Vec<Bson>, _: &str) -> DocumentResult<Vec<BsonDocument>> {
            Ok(vec![])
        }

        async fn query_documents(&self, _: Query, _: &str) -> DocumentResult<Vec<BsonDocument>> {
            Ok(vec![])
        }
    }

    fn store() -> DocumentStore<RecordingBackend> {
        let mut models = ModelRegistry::default();
        let person = models
            .schema("Person")
            .field("name", FieldOptions::typed("string").as_key("n"))
            .unwrap();
        models.register(person).unwrap();

        DocumentStore::new(RecordingBackend::default(), Arc::new(models))
    }

    #[tokio::test]
    async fn save_checkpoints_after_each_write() {
        let store = store();
        let mut person = store.models().new_document("Person").unwrap();
        person.set("name", "Ada").unwrap();

        store.save(&mut person).await.unwrap();
        store.save(&mut person).await.unwrap();
        person.set("name", "Grace").unwrap();
        store.save(&mut person).await.unwrap();

        let inserts = store.backend().inserts.lock().unwrap().clone();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].get("n"), Some(&Bson::from("Ada")));

        let updates = store.backend().updates.lock().unwrap().clone();
        assert_eq!(updates, vec![doc! { "$set": { "n": "Grace" } }]);
        assert!(!person.changed());
    }

    #[tokio::test]
    async fn missing_documents_are_reported() {
        let store = store();

        assert!(matches!(
            store.find("Person", "5f1d7a7e8b3e4c2a9c0d1e2f").await,
            Err(DocumentError::DocumentNotFound(..))
        ));
        assert!(matches!(
            store.find("Robot", 1).await,
            Err(DocumentError::Schema(SchemaError::UnknownModel(_)))
        ));
    }
}
