//! Active locale and fallback chains consumed by localized fields.
//!
//! The core never decides which locale is active. It asks a [`LocaleProvider`], which
//! every schema carries. [`I18n`] is the provider built from [`I18nConfig`]; applications
//! with request-scoped locales can implement the trait themselves.

use std::{collections::HashMap, fmt::Debug, sync::RwLock};

use crate::config::I18nConfig;

/// Source of the active locale and of the chain consulted when a translation is missing.
pub trait LocaleProvider: Send + Sync + Debug {
    /// Returns the active locale identifier.
    fn locale(&self) -> String;

    /// Returns the ordered chain of locales to consult for `locale`, starting with `locale` itself.
    fn fallbacks(&self, locale: &str) -> Vec<String>;
}

/// Locale provider backed by an [`I18nConfig`] and a switchable active locale.
#[derive(Debug)]
pub struct I18n {
    locale: RwLock<String>,
    default_locale: String,
    fallbacks: bool,
    chains: HashMap<String, Vec<String>>,
}

impl I18n {
    /// Creates a provider whose active locale is the configured default locale.
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            locale: RwLock::new(config.default_locale.clone()),
            default_locale: config.default_locale.clone(),
            fallbacks: config.fallbacks,
            chains: config.chains.clone(),
        }
    }

    /// Switches the active locale.
    pub fn set_locale(&self, locale: impl Into<String>) {
        match self.locale.write() {
            Ok(mut guard) => *guard = locale.into(),
            Err(poisoned) => *poisoned.into_inner() = locale.into(),
        }
    }

    /// Returns the locale that is active when nothing else was set.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(&I18nConfig::default())
    }
}

impl LocaleProvider for I18n {
    fn locale(&self) -> String {
        match self.locale.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn fallbacks(&self, locale: &str) -> Vec<String> {
        let mut chain = vec![locale.to_string()];

        if !self.fallbacks {
            return chain;
        }

        let configured = self
            .chains
            .get(locale)
            .cloned()
            .unwrap_or_else(|| vec![self.default_locale.clone()]);

        for candidate in configured {
            if !chain.contains(&candidate) {
                chain.push(candidate);
            }
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(fallbacks: bool) -> I18nConfig {
        I18nConfig {
            default_locale: "en".to_string(),
            fallbacks,
            chains: HashMap::from([(
                "de".to_string(),
                vec!["de".to_string(), "en".to_string(), "es".to_string()],
            )]),
        }
    }

    #[test]
    fn chain_starts_with_locale_and_skips_duplicates() {
        let i18n = I18n::new(&config(true));

        assert_eq!(i18n.fallbacks("de"), vec!["de", "en", "es"]);
    }

    #[test]
    fn unconfigured_locale_falls_back_to_default() {
        let i18n = I18n::new(&config(true));

        assert_eq!(i18n.fallbacks("fr"), vec!["fr", "en"]);
    }

    #[test]
    fn disabled_fallbacks_only_yield_the_locale() {
        let i18n = I18n::new(&config(false));

        assert_eq!(i18n.fallbacks("de"), vec!["de"]);
    }

    #[test]
    fn set_locale_switches_active_locale() {
        let i18n = I18n::default();
        assert_eq!(i18n.locale(), "en");

        i18n.set_locale("de");
        assert_eq!(i18n.locale(), "de");
    }
}
