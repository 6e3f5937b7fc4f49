use std::sync::Arc;

use crate::core::interfaces::ports::{HostEnvironment, KeyValueStorage};
use crate::core::models::{
    base_subtag, is_supported_language, language_for_locale, IslandSettings, LanguageSource,
    UserLanguage,
};
use crate::global_constants::{DEFAULT_OCR_LANGUAGE, LOG_TAG_LANGUAGE};

/// Picks the OCR language: stored setting, then exact UI locale, then the
/// locale's base subtag, then the default.
pub fn resolve_language(explicit: Option<&str>, ui_locale: &str) -> UserLanguage {
    if let Some(code) = explicit {
        if is_supported_language(code) {
            return UserLanguage::new(code, LanguageSource::UserSetting);
        }
        log::warn!(
            "{} Ignoring unsupported stored language {:?}",
            LOG_TAG_LANGUAGE,
            code
        );
    }

    if let Some(code) = language_for_locale(ui_locale) {
        return UserLanguage::new(code, LanguageSource::BrowserLocale);
    }

    if let Some(code) = language_for_locale(base_subtag(ui_locale)) {
        return UserLanguage::new(code, LanguageSource::BrowserLocaleBase);
    }

    UserLanguage::new(DEFAULT_OCR_LANGUAGE, LanguageSource::Default)
}

pub struct LanguageResolver {
    storage: Arc<dyn KeyValueStorage>,
    environment: Arc<dyn HostEnvironment>,
}

impl LanguageResolver {
    pub fn new(storage: Arc<dyn KeyValueStorage>, environment: Arc<dyn HostEnvironment>) -> Self {
        Self {
            storage,
            environment,
        }
    }

    pub async fn resolve(&self) -> UserLanguage {
        let explicit = match IslandSettings::stored_language(self.storage.as_ref()).await {
            Ok(language) => language,
            Err(error) => {
                log::warn!(
                    "{} Could not read stored language, treating as unset: {:#}",
                    LOG_TAG_LANGUAGE,
                    error
                );
                None
            }
        };

        let ui_locale = self.environment.ui_language();
        let resolved = resolve_language(explicit.as_deref(), &ui_locale);

        log::info!(
            "{} Using {} (from {}, ui locale {})",
            LOG_TAG_LANGUAGE,
            resolved.code,
            resolved.source,
            ui_locale
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStorage;
    use crate::global_constants::STORAGE_KEY_ISLAND_SETTINGS;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    struct MockEnvironment {
        locale: &'static str,
    }

    #[async_trait]
    impl HostEnvironment for MockEnvironment {
        fn ui_language(&self) -> String {
            self.locale.to_string()
        }

        async fn command_shortcut(&self, _command: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl KeyValueStorage for FailingStorage {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            anyhow::bail!("storage unavailable")
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<()> {
            anyhow::bail!("storage unavailable")
        }

        async fn remove(&self, _keys: &[&str]) -> Result<()> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[test]
    fn test_explicit_setting_wins_over_supported_locale() {
        let resolved = resolve_language(Some("jpn"), "fr-FR");

        assert_eq!(resolved, UserLanguage::new("jpn", LanguageSource::UserSetting));
    }

    #[test]
    fn test_exact_locale_match_is_second_tier() {
        let resolved = resolve_language(None, "zh-TW");

        assert_eq!(
            resolved,
            UserLanguage::new("chi_tra", LanguageSource::BrowserLocale)
        );
    }

    #[test]
    fn test_base_subtag_match_is_third_tier() {
        let resolved = resolve_language(None, "fr-CA");

        assert_eq!(
            resolved,
            UserLanguage::new("fra", LanguageSource::BrowserLocaleBase)
        );
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        let resolved = resolve_language(None, "xx-YY");

        assert_eq!(resolved, UserLanguage::new("eng", LanguageSource::Default));
    }

    #[test]
    fn test_unsupported_stored_language_falls_through() {
        let resolved = resolve_language(Some("klingon"), "de-DE");

        assert_eq!(
            resolved,
            UserLanguage::new("deu", LanguageSource::BrowserLocaleBase)
        );
    }

    #[tokio::test]
    async fn test_resolver_reads_language_from_stored_settings() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .set(
                STORAGE_KEY_ISLAND_SETTINGS,
                serde_json::json!({ "autoCopy": true, "autoExpand": false, "language": "spa" }),
            )
            .await
            .unwrap();
        let resolver = LanguageResolver::new(storage, Arc::new(MockEnvironment { locale: "en-US" }));

        let resolved = resolver.resolve().await;

        assert_eq!(resolved, UserLanguage::new("spa", LanguageSource::UserSetting));
    }

    #[tokio::test]
    async fn test_resolver_treats_storage_errors_as_no_setting() {
        let resolver = LanguageResolver::new(
            Arc::new(FailingStorage),
            Arc::new(MockEnvironment { locale: "ko" }),
        );

        let resolved = resolver.resolve().await;

        assert_eq!(resolved, UserLanguage::new("kor", LanguageSource::BrowserLocale));
    }
}
