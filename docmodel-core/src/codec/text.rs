use bson::Bson;

use super::{Codec, CodecResult};
use crate::error::CoercionError;

/// Text, stored as a BSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl StringCodec {
    pub const TAG: &'static str = "string";
}

impl Codec for StringCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::Symbol(symbol) => Bson::String(symbol),
            Bson::Int32(value) => Bson::String(value.to_string()),
            Bson::Int64(value) => Bson::String(value.to_string()),
            Bson::Double(value) => Bson::String(value.to_string()),
            Bson::Boolean(value) => Bson::String(value.to_string()),
            Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
            other => other,
        })
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::Symbol(symbol) => Bson::String(symbol),
            other => other,
        })
    }
}

/// Symbols, stored as BSON symbols and read back as strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolCodec;

impl SymbolCodec {
    pub const TAG: &'static str = "symbol";
}

impl Codec for SymbolCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::String(text) if text.is_empty() => Bson::Null,
            Bson::String(text) => Bson::Symbol(text),
            other => other,
        })
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(match value {
            Bson::Symbol(symbol) => Bson::String(symbol),
            other => other,
        })
    }
}

/// Booleans, accepting the usual textual and numeric spellings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl BooleanCodec {
    pub const TAG: &'static str = "boolean";

    const TRUTHY: [&'static str; 6] = ["true", "t", "yes", "y", "1", "1.0"];
    const FALSY: [&'static str; 6] = ["false", "f", "no", "n", "0", "0.0"];

    fn parse(input: &str) -> Option<bool> {
        let lowered = input.trim().to_ascii_lowercase();

        if Self::TRUTHY.contains(&lowered.as_str()) {
            Some(true)
        } else if Self::FALSY.contains(&lowered.as_str()) {
            Some(false)
        } else {
            None
        }
    }
}

impl Codec for BooleanCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Boolean(value) => Ok(Bson::Boolean(value)),
            Bson::String(input) if input.trim().is_empty() => Ok(Bson::Null),
            Bson::String(input) => Self::parse(&input)
                .map(Bson::Boolean)
                .ok_or_else(|| CoercionError::new(Self::TAG, &Bson::String(input.clone()), "not a boolean")),
            Bson::Int32(value) => Self::from_integer(value as i64),
            Bson::Int64(value) => Self::from_integer(value),
            Bson::Double(value) if value == 1.0 => Ok(Bson::Boolean(true)),
            Bson::Double(value) if value == 0.0 => Ok(Bson::Boolean(false)),
            Bson::Double(value) => Err(CoercionError::new(Self::TAG, &Bson::Double(value), "not a boolean")),
            other => Ok(other),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(self.mongoize(value.clone()).unwrap_or(value))
    }
}

impl BooleanCodec {
    fn from_integer(value: i64) -> CodecResult {
        match value {
            1 => Ok(Bson::Boolean(true)),
            0 => Ok(Bson::Boolean(false)),
            other => Err(CoercionError::new(Self::TAG, &Bson::Int64(other), "not a boolean")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn string_renders_scalars() {
        let codec = StringCodec;
        let oid = ObjectId::new();

        assert_eq!(codec.mongoize(Bson::Int32(3)).unwrap(), Bson::String("3".into()));
        assert_eq!(codec.mongoize(Bson::Boolean(false)).unwrap(), Bson::String("false".into()));
        assert_eq!(codec.mongoize(Bson::ObjectId(oid)).unwrap(), Bson::String(oid.to_hex()));
        assert_eq!(codec.mongoize(Bson::Null).unwrap(), Bson::Null);
    }

    #[test]
    fn symbol_is_stored_as_symbol_and_read_as_string() {
        let codec = SymbolCodec;
        let stored = codec.mongoize(Bson::String("active".into())).unwrap();

        assert_eq!(stored, Bson::Symbol("active".into()));
        assert_eq!(codec.demongoize(stored).unwrap(), Bson::String("active".into()));
    }

    #[test]
    fn boolean_accepts_spellings() {
        let codec = BooleanCodec;

        for truthy in ["true", "T", "yes", "y", "1", "1.0"] {
            assert_eq!(codec.mongoize(Bson::String(truthy.into())).unwrap(), Bson::Boolean(true));
        }
        for falsy in ["false", "F", "no", "n", "0", "0.0"] {
            assert_eq!(codec.mongoize(Bson::String(falsy.into())).unwrap(), Bson::Boolean(false));
        }
        assert_eq!(codec.mongoize(Bson::Int32(1)).unwrap(), Bson::Boolean(true));
        assert!(codec.mongoize(Bson::String("maybe".into())).is_err());
        assert!(codec.mongoize(Bson::Int32(2)).is_err());
    }
}
