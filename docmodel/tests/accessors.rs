use docmodel::{accessors, bson::{Bson, doc}, config::Config, field::FieldOptions, model::ModelRegistry};

accessors! {
    /// Accessors of the `Article` model.
    pub trait ArticleAccessors {
        /// Headline, stored under `h`.
        headline,
        views: i64,
        published: bool,
        #[localized]
        summary: String,
    }
}

fn registry() -> ModelRegistry {
    let config = Config::builder()
        .with_fallbacks(true)
        .with_fallback_chain("de", ["en"])
        .build();
    let mut models = ModelRegistry::new(config);

    let article = models
        .schema("Article")
        .field("headline", FieldOptions::typed("string").as_key("h"))
        .unwrap()
        .field("views", FieldOptions::typed("integer").default_value(0))
        .unwrap()
        .field("published", FieldOptions::typed("boolean"))
        .unwrap()
        .field("summary", FieldOptions::typed("string").localize())
        .unwrap();
    models.register(article).unwrap();

    models
}

#[test]
fn untyped_accessors_read_and_write_bson() {
    let models = registry();
    let mut article = models.new_document("Article").unwrap();

    article.set_headline("Hello").unwrap();

    assert_eq!(article.headline().unwrap(), Bson::from("Hello"));
    assert_eq!(article.attributes().get("h"), Some(&Bson::from("Hello")));
}

#[test]
fn typed_accessors_go_through_serde_and_codecs() {
    let models = registry();
    let mut article = models.new_document("Article").unwrap();

    assert_eq!(article.views().unwrap(), 0);

    article.set_views(12).unwrap();
    article.set("published", "yes").unwrap();

    assert_eq!(article.views().unwrap(), 12);
    assert!(article.published().unwrap());
    assert_eq!(article.changed_fields(), vec!["views", "published"]);
}

#[test]
fn localized_accessors_expose_translations() {
    let models = registry();
    let mut article = models.new_document("Article").unwrap();

    article.set_summary("A short story".to_string()).unwrap();
    article
        .set_summary_translations(doc! { "en": "A short story", "de": "Eine kurze Geschichte" })
        .unwrap();

    models.i18n().set_locale("de");
    assert_eq!(article.summary().unwrap(), "Eine kurze Geschichte");
    assert_eq!(
        article.summary_translations().unwrap(),
        doc! { "en": "A short story", "de": "Eine kurze Geschichte" }
    );
}
