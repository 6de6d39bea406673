use docmodel::{
    bson::{Bson, doc},
    memory::InMemoryStore,
    prelude::*,
};
use std::sync::Arc;

fn registry() -> ModelRegistry {
    let mut models = ModelRegistry::default();

    let animal = models
        .schema("Animal")
        .field("name", FieldOptions::typed("string").as_key("n"))
        .unwrap()
        .field("age", FieldOptions::typed("integer").default_value(0))
        .unwrap()
        .field("chip", FieldOptions::typed("string").readonly())
        .unwrap()
        .validates_presence_of("name");
    models.register(animal).unwrap();

    let dog = models
        .extend("Animal", "Dog")
        .unwrap()
        .field("breed", FieldOptions::typed("string"))
        .unwrap();
    models.register(dog).unwrap();

    let cat = models.extend("Animal", "Cat").unwrap();
    models.register(cat).unwrap();

    models
}

fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new(), Arc::new(registry()))
}

#[tokio::test]
async fn save_inserts_then_sends_only_changes() {
    let store = store();
    let mut rex = store.models().new_document("Dog").unwrap();
    rex.assign_attributes(doc! { "name": "Rex", "breed": "Collie", "chip": "A1" })
        .unwrap();

    store.save(&mut rex).await.unwrap();
    assert!(rex.is_persisted());
    assert!(!rex.changed());

    rex.set("age", 4).unwrap();
    assert_eq!(rex.atomic_updates(), doc! { "$set": { "age": 4 } });
    store.save(&mut rex).await.unwrap();

    assert_eq!(
        rex.previous_changes().get("age"),
        Some(&Change::new(Some(Bson::Int32(0)), Some(Bson::Int32(4))))
    );

    let id = rex.id().cloned().unwrap();
    let stored = StoreBackend::get_documents(store.backend(), vec![id], "animals")
        .await
        .unwrap();
    assert_eq!(stored[0].get("n"), Some(&Bson::from("Rex")));
    assert_eq!(stored[0].get("age"), Some(&Bson::Int32(4)));
    assert_eq!(stored[0].get("_type"), Some(&Bson::from("Dog")));
}

#[tokio::test]
async fn invalid_documents_are_not_written() {
    let store = store();
    let mut nameless = store.models().new_document("Animal").unwrap();

    let result = store.save(&mut nameless).await;

    assert!(matches!(result, Err(DocumentError::Validation(_))));
    assert_eq!(store.backend().count("animals").await, 0);
    assert!(nameless.is_new_record());
}

#[tokio::test]
async fn find_materializes_the_stored_type() {
    let store = store();
    let mut rex = store
        .models()
        .build_document("Dog", doc! { "name": "Rex", "breed": "Collie" })
        .unwrap();
    store.save(&mut rex).await.unwrap();
    let id = rex.id().cloned().unwrap();

    let mut found = store.find("Animal", id.clone()).await.unwrap();
    assert_eq!(found.model_name(), "Dog");
    assert_eq!(found.get("breed").unwrap(), Bson::from("Collie"));

    let Bson::ObjectId(oid) = &id else {
        panic!("expected an object id");
    };
    assert!(store.find("Dog", oid.to_hex()).await.is_ok());
    assert!(matches!(
        store.find("Cat", id).await,
        Err(DocumentError::DocumentNotFound(..))
    ));
}

#[tokio::test]
async fn queries_are_scoped_to_the_subtree() {
    let store = store();
    for (model, name, age) in [("Dog", "Rex", 4), ("Cat", "Tom", 7), ("Animal", "Blob", 1), ("Dog", "Fido", 9)] {
        let mut animal = store
            .models()
            .build_document(model, doc! { "name": name, "age": age })
            .unwrap();
        store.save(&mut animal).await.unwrap();
    }

    let dogs = store
        .query(
            store
                .models()
                .criteria("Dog")
                .unwrap()
                .order_by("age", SortDirection::Desc)
                .unwrap(),
        )
        .await
        .unwrap();
    let mut names = Vec::new();
    for mut dog in dogs {
        assert_eq!(dog.model_name(), "Dog");
        names.push(dog.get("name").unwrap());
    }
    assert_eq!(names, vec![Bson::from("Fido"), Bson::from("Rex")]);

    let older = store
        .query(
            store
                .models()
                .criteria("Animal")
                .unwrap()
                .where_op("age", FieldOp::Gt, "3")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(older.len(), 3);

    let all = store
        .query(store.models().criteria("Animal").unwrap().limit(2))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn readonly_fields_survive_bulk_updates_of_loaded_documents() {
    let store = store();
    let mut rex = store
        .models()
        .build_document("Dog", doc! { "name": "Rex", "chip": "A1" })
        .unwrap();
    store.save(&mut rex).await.unwrap();

    let mut loaded = store.find("Dog", rex.id().cloned().unwrap()).await.unwrap();
    loaded
        .assign_attributes(doc! { "chip": "B2", "name": "Rex II" })
        .unwrap();
    store.save(&mut loaded).await.unwrap();

    let mut reloaded = store.find("Dog", rex.id().cloned().unwrap()).await.unwrap();
    assert_eq!(reloaded.get("chip").unwrap(), Bson::from("A1"));
    assert_eq!(reloaded.get("name").unwrap(), Bson::from("Rex II"));
}

#[tokio::test]
async fn deleted_documents_are_gone() {
    let store = store();
    let mut tom = store
        .models()
        .build_document("Cat", doc! { "name": "Tom" })
        .unwrap();
    store.save(&mut tom).await.unwrap();

    store.delete(&tom).await.unwrap();

    assert!(store.find("Cat", tom.id().cloned().unwrap()).await.is_err());
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn boxed_backends_serve_the_same_store() {
    let backend: Box<dyn DynStoreBackend> = Box::new(InMemoryStore::new());
    let store = DocumentStore::new(backend, Arc::new(registry()));

    let mut rex = store
        .models()
        .build_document("Dog", doc! { "name": "Rex" })
        .unwrap();
    store.save(&mut rex).await.unwrap();

    assert!(store.find("Animal", rex.id().cloned().unwrap()).await.is_ok());
    store.shutdown().await.unwrap();
}
