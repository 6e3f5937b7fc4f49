use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::interfaces::ports::KeyValueStorage;
use crate::global_constants::{
    DEFAULT_AUTO_COPY, DEFAULT_AUTO_EXPAND, DEFAULT_OCR_LANGUAGE, LOG_TAG_STORAGE,
    STORAGE_KEY_ISLAND_SETTINGS,
};

/// User-facing settings shown in the result widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandSettings {
    #[serde(default = "default_auto_copy")]
    pub auto_copy: bool,
    #[serde(default = "default_auto_expand")]
    pub auto_expand: bool,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_auto_copy() -> bool {
    DEFAULT_AUTO_COPY
}

fn default_auto_expand() -> bool {
    DEFAULT_AUTO_EXPAND
}

fn default_language() -> String {
    DEFAULT_OCR_LANGUAGE.to_string()
}

impl Default for IslandSettings {
    fn default() -> Self {
        Self {
            auto_copy: DEFAULT_AUTO_COPY,
            auto_expand: DEFAULT_AUTO_EXPAND,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
        }
    }
}

impl IslandSettings {
    /// Loads the stored settings, filling any missing field from the defaults.
    pub async fn load(storage: &dyn KeyValueStorage) -> Result<Self> {
        let stored = storage
            .get(STORAGE_KEY_ISLAND_SETTINGS)
            .await
            .context("Failed to read island settings")?;

        let Some(value) = stored else {
            log::info!("{} No settings stored, using defaults", LOG_TAG_STORAGE);
            return Ok(Self::default());
        };

        let settings: IslandSettings =
            serde_json::from_value(value).context("Stored island settings are malformed")?;

        log::debug!(
            "{} Loaded settings: autoCopy={}, autoExpand={}, language={}",
            LOG_TAG_STORAGE,
            settings.auto_copy,
            settings.auto_expand,
            settings.language
        );
        Ok(settings)
    }

    pub async fn save(&self, storage: &dyn KeyValueStorage) -> Result<()> {
        let value = serde_json::to_value(self).context("Failed to serialize island settings")?;
        storage
            .set(STORAGE_KEY_ISLAND_SETTINGS, value)
            .await
            .context("Failed to write island settings")?;

        log::info!("{} Saved settings", LOG_TAG_STORAGE);
        Ok(())
    }

    /// Language explicitly recorded by the user, without default filling.
    pub async fn stored_language(storage: &dyn KeyValueStorage) -> Result<Option<String>> {
        let stored = storage
            .get(STORAGE_KEY_ISLAND_SETTINGS)
            .await
            .context("Failed to read island settings")?;

        Ok(stored
            .as_ref()
            .and_then(|settings| settings.get("language"))
            .and_then(|language| language.as_str())
            .map(str::to_string))
    }
}
