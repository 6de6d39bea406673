//! Dirty tracking between persistence checkpoints.
//!
//! The tracker remembers, per storage key, the raw value the attribute had at the last
//! checkpoint. The current value is always read back from the [`Attributes`], so repeated
//! writes only ever keep the original side of the pair. A key whose value is written back
//! to its original is no longer considered changed.

use bson::Bson;
use indexmap::IndexMap;

use crate::attributes::Attributes;

/// The transition of one attribute. `None` means the attribute was absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Raw value at the last checkpoint.
    pub old: Option<Bson>,
    /// Raw value now.
    pub new: Option<Bson>,
}

impl Change {
    pub fn new(old: Option<Bson>, new: Option<Bson>) -> Self {
        Self { old, new }
    }
}

/// Originals of the keys written since the last checkpoint, in first-write order, plus the
/// changes of the last committed cycle.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    originals: IndexMap<String, Option<Bson>>,
    previous: IndexMap<String, Change>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write of `new` over `old` at `key`. Must be called before the write lands.
    pub fn record(&mut self, key: &str, old: Option<&Bson>, new: Option<&Bson>) {
        match self.originals.get(key) {
            Some(original) if original.as_ref() == new => {
                self.originals.shift_remove(key);
            }
            Some(_) => {}
            None if old != new => {
                self.originals.insert(key.to_string(), old.cloned());
            }
            None => {}
        }
    }

    /// True if any key differs from its original.
    pub fn is_changed(&self) -> bool {
        !self.originals.is_empty()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.originals.contains_key(key)
    }

    /// Raw value `key` had at the last checkpoint, if it has changed since.
    pub fn original(&self, key: &str) -> Option<&Option<Bson>> {
        self.originals.get(key)
    }

    /// Changed keys, in first-write order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.originals.keys().map(String::as_str)
    }

    /// Stops tracking `key`, returning the original value.
    pub fn forget(&mut self, key: &str) -> Option<Option<Bson>> {
        self.originals.shift_remove(key)
    }

    /// Current changes keyed by storage key.
    pub fn changes(&self, attributes: &Attributes) -> IndexMap<String, Change> {
        self.originals
            .iter()
            .map(|(key, old)| {
                (
                    key.clone(),
                    Change::new(old.clone(), attributes.get(key).cloned()),
                )
            })
            .collect()
    }

    /// Moves the current changes into the previous changes and starts a new cycle.
    pub fn commit(&mut self, attributes: &Attributes) {
        self.previous = self.changes(attributes);
        self.originals.clear();
    }

    /// Changes of the last committed cycle, keyed by storage key.
    pub fn previous(&self) -> &IndexMap<String, Change> {
        &self.previous
    }
}
