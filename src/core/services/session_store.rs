//! Session state mirrored into durable storage.
//!
//! The in-memory copy is only a cache: every write goes through to storage
//! and every cache miss falls back to it, so a restarted coordinator picks up
//! where the previous process left off.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::interfaces::ports::KeyValueStorage;
use crate::core::models::{CoordinatorError, EncodedImage, Result, Session, StateKey, TabId};
use crate::global_constants::LOG_TAG_SESSION;

pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    cache: Mutex<Session>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            cache: Mutex::new(Session::default()),
        }
    }

    /// Starts a new session, discarding the previous session's crop.
    pub async fn begin(&self, owner_tab_id: TabId, captured_image: EncodedImage) -> Result<()> {
        log::info!("{} Starting session owned by {}", LOG_TAG_SESSION, owner_tab_id);

        self.remove(&[StateKey::CroppedImage]).await?;
        self.set_owner_tab(owner_tab_id).await?;
        self.set_captured_image(captured_image).await
    }

    pub async fn owner_tab(&self) -> Result<TabId> {
        self.read(StateKey::OwnerTab, |session| session.owner_tab_id, |session, tab_id| {
            session.owner_tab_id = Some(tab_id)
        })
        .await
    }

    pub async fn set_owner_tab(&self, tab_id: TabId) -> Result<()> {
        log::debug!("{} Owner tab is now {}", LOG_TAG_SESSION, tab_id);
        self.write(StateKey::OwnerTab, &tab_id, |session| {
            session.owner_tab_id = Some(tab_id)
        })
        .await
    }

    pub async fn captured_image(&self) -> Result<EncodedImage> {
        self.read(
            StateKey::CapturedImage,
            |session| session.captured_image.clone(),
            |session, image| session.captured_image = Some(image),
        )
        .await
    }

    pub async fn set_captured_image(&self, image: EncodedImage) -> Result<()> {
        self.write(StateKey::CapturedImage, &image, |session| {
            session.captured_image = Some(image.clone())
        })
        .await
    }

    pub async fn cropped_image(&self) -> Result<EncodedImage> {
        self.read(
            StateKey::CroppedImage,
            |session| session.cropped_image.clone(),
            |session, image| session.cropped_image = Some(image),
        )
        .await
    }

    pub async fn set_cropped_image(&self, image: EncodedImage) -> Result<()> {
        self.write(StateKey::CroppedImage, &image, |session| {
            session.cropped_image = Some(image.clone())
        })
        .await
    }

    /// Best available image context for an error report: the crop if one
    /// exists, otherwise the full capture.
    pub async fn image_context(&self) -> Option<EncodedImage> {
        match self.cropped_image().await {
            Ok(image) => Some(image),
            Err(_) => self.captured_image().await.ok(),
        }
    }

    /// Drops the persisted images but keeps the owner tab.
    pub async fn clear_images(&self) -> Result<()> {
        log::info!("{} Clearing stored images", LOG_TAG_SESSION);
        self.remove(&[StateKey::CapturedImage, StateKey::CroppedImage])
            .await
    }

    /// Snapshot of the cached fields; empty after a restart until read.
    pub fn cached(&self) -> Session {
        self.cache_guard().clone()
    }

    fn cache_guard(&self) -> std::sync::MutexGuard<'_, Session> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read<T, G, F>(&self, key: StateKey, cached: G, fill: F) -> Result<T>
    where
        T: DeserializeOwned + Clone,
        G: Fn(&Session) -> Option<T>,
        F: Fn(&mut Session, T),
    {
        let cached_value = cached(&self.cache_guard());
        if let Some(value) = cached_value {
            return Ok(value);
        }

        log::debug!("{} Cache miss for {}, reading storage", LOG_TAG_SESSION, key);
        let stored = self
            .storage
            .get(key.storage_key())
            .await
            .map_err(CoordinatorError::storage)?
            .ok_or(CoordinatorError::MissingState(key))?;

        let value: T = serde_json::from_value(stored).map_err(|error| {
            CoordinatorError::Storage(format!("stored {} is malformed: {}", key, error))
        })?;

        fill(&mut self.cache_guard(), value.clone());
        Ok(value)
    }

    async fn write<T, F>(&self, key: StateKey, value: &T, update_cache: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&mut Session),
    {
        update_cache(&mut self.cache_guard());

        let serialized = serde_json::to_value(value).map_err(|error| {
            CoordinatorError::Storage(format!("failed to serialize {}: {}", key, error))
        })?;

        self.storage
            .set(key.storage_key(), serialized)
            .await
            .map_err(CoordinatorError::storage)
    }

    async fn remove(&self, keys: &[StateKey]) -> Result<()> {
        {
            let mut cache = self.cache_guard();
            for key in keys {
                match key {
                    StateKey::OwnerTab => cache.owner_tab_id = None,
                    StateKey::CapturedImage => cache.captured_image = None,
                    StateKey::CroppedImage => cache.cropped_image = None,
                }
            }
        }

        let storage_keys: Vec<&str> = keys.iter().map(StateKey::storage_key).collect();
        self.storage
            .remove(&storage_keys)
            .await
            .map_err(CoordinatorError::storage)
    }
}
