//! Per-document raw values, keyed by storage key.

use bson::{Bson, Document as BsonDocument};

/// The stored form of one document. This is the only state that gets persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    raw: BsonDocument,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value at `key`. `None` means absent, which is not the same as `Bson::Null`.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.raw.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw.contains_key(key)
    }

    /// Writes a raw value, returning the one it replaced.
    pub fn insert(&mut self, key: &str, value: Bson) -> Option<Bson> {
        self.raw.insert(key, value)
    }

    /// Removes `key`, returning its raw value.
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.raw.remove(key)
    }

    /// Writes `value`, or removes the key when it is `None`.
    pub fn put(&mut self, key: &str, value: Option<Bson>) {
        match value {
            Some(value) => {
                self.raw.insert(key, value);
            }
            None => {
                self.raw.remove(key);
            }
        }
    }

    /// Storage keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The stored form, as handed to a backend.
    pub fn as_document(&self) -> &BsonDocument {
        &self.raw
    }

    pub fn into_document(self) -> BsonDocument {
        self.raw
    }
}

impl From<BsonDocument> for Attributes {
    fn from(raw: BsonDocument) -> Self {
        Self { raw }
    }
}
