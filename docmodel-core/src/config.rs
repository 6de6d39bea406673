//! Process-wide settings consumed when a [`ModelRegistry`](crate::model::ModelRegistry) is created.
//!
//! A [`Config`] can be built fluently with [`Config::builder`] or loaded from JSON:
//!
//! ```ignore
//! use docmodel_core::config::Config;
//!
//! let config = Config::from_json_str(r#"{
//!     "use_utc": true,
//!     "i18n": { "default_locale": "en", "fallbacks": true, "chains": { "de": ["en", "es"] } }
//! }"#)?;
//! ```

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DocumentResult;

/// Settings for the mapping core.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Storage key holding the discriminator of every document.
    pub discriminator_key: String,
    /// When true, `time` and `date_time` fields are read back in UTC instead of the configured offset.
    pub use_utc: bool,
    /// Offset of the application time zone, in seconds east of UTC.
    pub utc_offset_seconds: i32,
    /// Localization settings.
    pub i18n: I18nConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discriminator_key: "_type".to_string(),
            use_utc: false,
            utc_offset_seconds: 0,
            i18n: I18nConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new builder for constructing a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads a configuration from a JSON value. Missing keys take their defaults.
    pub fn from_json(value: serde_json::Value) -> DocumentResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Loads a configuration from a JSON string. Missing keys take their defaults.
    pub fn from_json_str(input: &str) -> DocumentResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// The application time zone. Offsets outside of a day fall back to UTC.
    pub fn time_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }
}

/// Localization settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct I18nConfig {
    /// Locale that is active until another one is set.
    pub default_locale: String,
    /// Whether localized fields consult a fallback chain on a miss.
    pub fallbacks: bool,
    /// Explicit fallback chains, keyed by locale. Locales without a chain fall back to the default locale.
    pub chains: HashMap<String, Vec<String>>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            fallbacks: false,
            chains: HashMap::new(),
        }
    }
}

/// Builder for constructing [`Config`] instances.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a builder seeded with the default configuration.
    pub fn new() -> Self {
        Self { config: Config::default() }
    }

    /// Sets the storage key of the discriminator.
    pub fn with_discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.config.discriminator_key = key.into();
        self
    }

    /// Reads times back in UTC.
    pub fn with_use_utc(mut self, use_utc: bool) -> Self {
        self.config.use_utc = use_utc;
        self
    }

    /// Sets the application time zone offset, in seconds east of UTC.
    pub fn with_utc_offset_seconds(mut self, seconds: i32) -> Self {
        self.config.utc_offset_seconds = seconds;
        self
    }

    /// Sets the locale that is active by default.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.config.i18n.default_locale = locale.into();
        self
    }

    /// Enables or disables locale fallbacks.
    pub fn with_fallbacks(mut self, enabled: bool) -> Self {
        self.config.i18n.fallbacks = enabled;
        self
    }

    /// Sets the fallback chain consulted for `locale`.
    pub fn with_fallback_chain<I, S>(mut self, locale: impl Into<String>, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .i18n
            .chains
            .insert(locale.into(), chain.into_iter().map(Into::into).collect());
        self
    }

    /// Builds and returns the final configuration.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = Config::from_json_str(r#"{ "use_utc": true }"#).unwrap();

        assert!(config.use_utc);
        assert_eq!(config.discriminator_key, "_type");
        assert_eq!(config.i18n.default_locale, "en");
        assert!(!config.i18n.fallbacks);
    }

    #[test]
    fn builder_sets_fallback_chain() {
        let config = Config::builder()
            .with_fallbacks(true)
            .with_fallback_chain("de", ["en", "es"])
            .build();

        assert_eq!(config.i18n.chains["de"], vec!["en".to_string(), "es".to_string()]);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let config = Config::builder()
            .with_utc_offset_seconds(90_000)
            .build();

        assert_eq!(config.time_zone().local_minus_utc(), 0);
    }
}
