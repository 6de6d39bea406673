use bson::{Bson, doc, oid::ObjectId};
use std::sync::Arc;

use docmodel_core::{
    codec::{Codec, CodecRegistry, CodecResult},
    config::Config,
    error::CoercionError,
    field::FieldOptions,
    model::ModelRegistry,
};

/// Money held as a float in the application and as integer cents in storage.
#[derive(Debug)]
struct CentsCodec;

impl Codec for CentsCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Double(amount) => Ok(Bson::Int64((amount * 100.0).round() as i64)),
            Bson::String(ref text) => text
                .parse::<f64>()
                .map(|amount| Bson::Int64((amount * 100.0).round() as i64))
                .map_err(|_| CoercionError::new("cents", &value, "not an amount")),
            other => Ok(other),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Int64(cents) => Ok(Bson::Double(cents as f64 / 100.0)),
            other => Ok(other),
        }
    }
}

fn round_trips(codecs: &CodecRegistry, tag: &str, value: Bson) {
    let codec = codecs.lookup(tag).unwrap();
    let stored = codec.mongoize(value.clone()).unwrap();

    assert_eq!(codec.demongoize(stored).unwrap(), value, "{tag} did not round-trip");
}

#[test]
fn builtin_codecs_round_trip() {
    let codecs = CodecRegistry::with_builtins(&Config::builder().with_use_utc(true).build());
    let id = ObjectId::new();

    round_trips(&codecs, "integer", Bson::Int32(42));
    round_trips(&codecs, "integer", Bson::Int64(i64::MAX));
    round_trips(&codecs, "float", Bson::Double(2.5));
    round_trips(&codecs, "decimal", Bson::String("10.25".into()));
    round_trips(&codecs, "boolean", Bson::Boolean(true));
    round_trips(&codecs, "string", Bson::String("hello".into()));
    round_trips(&codecs, "symbol", Bson::String("sym".into()));
    round_trips(&codecs, "date", Bson::String("2024-01-15".into()));
    round_trips(&codecs, "date_time", Bson::String("2024-01-15T10:30:00.000Z".into()));
    round_trips(&codecs, "time", Bson::String("2024-01-15T10:30:00.125Z".into()));
    round_trips(&codecs, "object_id", Bson::ObjectId(id));
    round_trips(&codecs, "hash", Bson::Document(doc! { "a": 1, "b": { "c": [1, 2] } }));
    round_trips(&codecs, "array", Bson::Array(vec![Bson::Int32(1), Bson::String("two".into())]));
    round_trips(&codecs, "range", Bson::Document(doc! { "min": 1, "max": 10 }));
    round_trips(&codecs, "regexp", Bson::String("^a+b$".into()));
}

#[test]
fn every_builtin_passes_null_through() {
    let codecs = CodecRegistry::with_builtins(&Config::default());

    for tag in [
        "array", "decimal", "boolean", "date", "date_time", "float", "hash", "integer", "object_id",
        "binary", "range", "regexp", "string", "symbol", "time", "time_with_zone",
    ] {
        let codec = codecs.lookup(tag).unwrap();
        assert_eq!(codec.mongoize(Bson::Null).unwrap(), Bson::Null, "{tag}");
    }
}

#[test]
fn custom_codecs_drive_declared_fields() {
    let mut models = ModelRegistry::default();
    models.register_codec("cents", Arc::new(CentsCodec)).unwrap();

    let invoice = models
        .schema("Invoice")
        .field("total", FieldOptions::typed("cents"))
        .unwrap();
    models.register(invoice).unwrap();

    let mut invoice = models.new_document("Invoice").unwrap();
    invoice.set("total", 12.34).unwrap();

    assert_eq!(invoice.raw("total"), Some(&Bson::Int64(1234)));
    assert_eq!(invoice.get("total").unwrap(), Bson::Double(12.34));
    assert!(invoice.set("total", "lots").is_err());
    assert_eq!(invoice.read::<f64>("total").unwrap(), 12.34);
}

#[test]
fn fields_with_unknown_types_are_refused() {
    let models = ModelRegistry::default();

    assert!(
        models
            .schema("Invoice")
            .field("total", FieldOptions::typed("cents"))
            .is_err()
    );
}
