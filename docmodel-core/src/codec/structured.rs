use bson::{Binary, Bson, Document as BsonDocument, doc, oid::ObjectId, spec::BinarySubtype};

use super::{Codec, CodecResult};
use crate::error::CoercionError;

/// Ordered lists, stored as BSON arrays with their elements untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayCodec;

impl ArrayCodec {
    pub const TAG: &'static str = "array";
}

impl Codec for ArrayCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }

    /// A scalar queried against an array field matches elements, so it is not wrapped.
    fn evolve(&self, value: Bson) -> CodecResult {
        Ok(value)
    }
}

/// Key/value maps, stored as embedded BSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCodec;

impl HashCodec {
    pub const TAG: &'static str = "hash";
}

impl Codec for HashCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }
}

/// Object ids. Legal 24 character hex strings are converted; other strings are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectIdCodec;

impl ObjectIdCodec {
    pub const TAG: &'static str = "object_id";
}

impl Codec for ObjectIdCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::String(text) if text.is_empty() => Bson::Null,
            Bson::String(text) => match ObjectId::parse_str(&text) {
                Ok(oid) => Bson::ObjectId(oid),
                Err(_) => Bson::String(text),
            },
            other => other,
        })
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }
}

/// Raw bytes, stored with the generic binary subtype.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub const TAG: &'static str = "binary";
}

impl Codec for BinaryCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::String(text) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: text.into_bytes(),
            }),
            other => other,
        })
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }
}

/// Bounded intervals, stored as `{min, max}` plus `exclude_end: true` for half-open ranges.
///
/// Serialized `std::ops::Range` values (`{start, end}`) are accepted as half-open ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeCodec;

impl RangeCodec {
    pub const TAG: &'static str = "range";

    fn bounds(document: &BsonDocument) -> Option<(Bson, Bson, bool)> {
        if let (Some(min), Some(max)) = (document.get("min"), document.get("max")) {
            let exclude_end = document.get_bool("exclude_end").unwrap_or(false);
            return Some((min.clone(), max.clone(), exclude_end));
        }

        if let (Some(start), Some(end)) = (document.get("start"), document.get("end")) {
            return Some((start.clone(), end.clone(), true));
        }

        None
    }

    fn canonical(value: Bson) -> CodecResult {
        match value {
            Bson::Document(document) => match Self::bounds(&document) {
                Some((min, max, exclude_end)) => {
                    let mut stored = doc! { "min": min, "max": max };
                    if exclude_end {
                        stored.insert("exclude_end", true);
                    }
                    Ok(Bson::Document(stored))
                }
                None => Err(CoercionError::new(
                    Self::TAG,
                    &Bson::Document(document.clone()),
                    "expected min/max or start/end bounds",
                )),
            },
            other => Ok(other),
        }
    }
}

impl Codec for RangeCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Self::canonical(value)
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(Self::canonical(value.clone()).unwrap_or(value))
    }

    /// Produces the operator form matching every value inside the range.
    fn evolve(&self, value: Bson) -> CodecResult {
        match Self::canonical(value)? {
            Bson::Document(stored) => match Self::bounds(&stored) {
                Some((min, max, true)) => Ok(Bson::Document(doc! { "$gte": min, "$lt": max })),
                Some((min, max, false)) => Ok(Bson::Document(doc! { "$gte": min, "$lte": max })),
                None => Ok(Bson::Document(stored)),
            },
            other => Ok(other),
        }
    }
}

/// Regular expressions, validated and stored as their pattern text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexpCodec;

impl RegexpCodec {
    pub const TAG: &'static str = "regexp";
}

impl Codec for RegexpCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::String(pattern) => match regex::Regex::new(&pattern) {
                Ok(_) => Ok(Bson::String(pattern)),
                Err(err) => Err(CoercionError::new(Self::TAG, &Bson::String(pattern.clone()), err.to_string())),
            },
            other => Ok(other),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(value)
    }
}
