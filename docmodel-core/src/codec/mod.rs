//! Type codecs: conversions between application values and their stored form.
//!
//! A [`Codec`] is the mongoize/demongoize/evolve triple for one logical type. Codecs are
//! stateless apart from settings captured at construction and are shared between every
//! field declared with their type tag. The [`CodecRegistry`] maps type tags to codecs and
//! is filled once, before any model is declared.
//!
//! # Custom codecs
//!
//! ```ignore
//! use std::sync::Arc;
//! use bson::Bson;
//! use docmodel_core::codec::{Codec, CodecResult};
//!
//! #[derive(Debug)]
//! struct UpcaseCodec;
//!
//! impl Codec for UpcaseCodec {
//!     fn mongoize(&self, value: Bson) -> CodecResult {
//!         Ok(match value {
//!             Bson::String(s) => Bson::String(s.to_uppercase()),
//!             other => other,
//!         })
//!     }
//!
//!     fn demongoize(&self, value: Bson) -> CodecResult {
//!         Ok(value)
//!     }
//! }
//!
//! registry.register("upcase", Arc::new(UpcaseCodec))?;
//! ```

mod numeric;
mod structured;
mod temporal;
mod text;

pub use numeric::{DecimalCodec, FloatCodec, IntegerCodec};
pub use structured::{ArrayCodec, BinaryCodec, HashCodec, ObjectIdCodec, RangeCodec, RegexpCodec};
pub use temporal::{DateCodec, TimeCodec, ZonePolicy};
pub use text::{BooleanCodec, StringCodec, SymbolCodec};

use bson::Bson;
use log::debug;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::{
    config::Config,
    error::{CoercionError, SchemaError},
};

/// Result of a single codec conversion.
pub type CodecResult = Result<Bson, CoercionError>;

/// Conversions for one logical type.
///
/// Every method must be free of side effects: the core calls `demongoize` afresh on every
/// read and never caches its output.
pub trait Codec: Send + Sync + Debug {
    /// Converts an application value to its canonical stored form.
    ///
    /// Values of a kind the codec does not recognise are returned unchanged.
    fn mongoize(&self, value: Bson) -> CodecResult;

    /// Rebuilds the application value from its stored form.
    fn demongoize(&self, value: Bson) -> CodecResult;

    /// Converts a value used in a query predicate to its stored form.
    ///
    /// Arrays are evolved element-wise so they can be used as `any_of` operands.
    fn evolve(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Array(items) => Ok(Bson::Array(
                items
                    .into_iter()
                    .map(|item| self.mongoize(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            other => self.mongoize(other),
        }
    }
}

/// Shared handle to a codec.
pub type CodecRef = Arc<dyn Codec>;

/// Maps type tags to codecs.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, CodecRef>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { codecs: HashMap::new() }
    }

    /// Creates a registry holding every built-in codec.
    ///
    /// Temporal codecs capture the zone policy of `config`.
    pub fn with_builtins(config: &Config) -> Self {
        let zone = config.time_zone();
        let time_policy = if config.use_utc {
            ZonePolicy::Utc
        } else {
            ZonePolicy::Offset(zone)
        };

        let builtins: [(&str, CodecRef); 16] = [
            (ArrayCodec::TAG, Arc::new(ArrayCodec)),
            (DecimalCodec::TAG, Arc::new(DecimalCodec)),
            (BooleanCodec::TAG, Arc::new(BooleanCodec)),
            (DateCodec::TAG, Arc::new(DateCodec::new(zone))),
            (
                TimeCodec::DATE_TIME,
                Arc::new(TimeCodec::new(TimeCodec::DATE_TIME, zone, time_policy)),
            ),
            (FloatCodec::TAG, Arc::new(FloatCodec)),
            (HashCodec::TAG, Arc::new(HashCodec)),
            (IntegerCodec::TAG, Arc::new(IntegerCodec)),
            (ObjectIdCodec::TAG, Arc::new(ObjectIdCodec)),
            (BinaryCodec::TAG, Arc::new(BinaryCodec)),
            (RangeCodec::TAG, Arc::new(RangeCodec)),
            (RegexpCodec::TAG, Arc::new(RegexpCodec)),
            (StringCodec::TAG, Arc::new(StringCodec)),
            (SymbolCodec::TAG, Arc::new(SymbolCodec)),
            (TimeCodec::TIME, Arc::new(TimeCodec::new(TimeCodec::TIME, zone, time_policy))),
            (
                TimeCodec::TIME_WITH_ZONE,
                Arc::new(TimeCodec::new(TimeCodec::TIME_WITH_ZONE, zone, ZonePolicy::Offset(zone))),
            ),
        ];

        Self {
            codecs: builtins
                .into_iter()
                .map(|(tag, codec)| (tag.to_string(), codec))
                .collect(),
        }
    }

    /// Registers a codec under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateCodec`] if the tag is already taken.
    pub fn register(&mut self, tag: impl Into<String>, codec: CodecRef) -> Result<(), SchemaError> {
        let tag = tag.into();

        if self.codecs.contains_key(&tag) {
            return Err(SchemaError::DuplicateCodec(tag));
        }

        debug!("registered codec for type '{tag}'");
        self.codecs.insert(tag, codec);

        Ok(())
    }

    /// Returns the codec registered under `tag`, if any.
    pub fn lookup(&self, tag: &str) -> Option<CodecRef> {
        self.codecs.get(tag).cloned()
    }

    /// Returns true if a codec is registered under `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }
}

/// Converts an integer to the narrowest BSON integer that holds it.
pub(crate) fn narrow_integer(value: i64) -> Bson {
    i32::try_from(value)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Identity;

    impl Codec for Identity {
        fn mongoize(&self, value: Bson) -> CodecResult {
            Ok(value)
        }

        fn demongoize(&self, value: Bson) -> CodecResult {
            Ok(value)
        }
    }

    #[test]
    fn builtins_cover_every_primitive_tag() {
        let registry = CodecRegistry::with_builtins(&Config::default());

        for tag in [
            "array", "decimal", "boolean", "date", "date_time", "float", "hash", "integer",
            "object_id", "binary", "range", "regexp", "string", "symbol", "time", "time_with_zone",
        ] {
            assert!(registry.contains(tag), "missing codec {tag}");
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = CodecRegistry::with_builtins(&Config::default());

        assert_eq!(
            registry.register("string", Arc::new(Identity)),
            Err(SchemaError::DuplicateCodec("string".to_string()))
        );
        assert!(registry.register("identity", Arc::new(Identity)).is_ok());
        assert!(registry.register("identity", Arc::new(Identity)).is_err());
    }

    #[test]
    fn lookup_misses_unknown_tags() {
        assert!(CodecRegistry::new().lookup("string").is_none());
    }

    #[test]
    fn default_evolve_maps_arrays_element_wise() {
        let codec = IntegerCodec;

        assert_eq!(
            codec.evolve(Bson::Array(vec![Bson::String("1".into()), Bson::Double(2.7)])).unwrap(),
            Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)])
        );
    }
}
