use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::interfaces::adapters::{OcrEngine, OcrEngineFactory};
use crate::core::models::{CoordinatorError, EncodedImage, OcrOutcome, Result};
use crate::global_constants::LOG_TAG_WORKER_POOL;

struct EngineHandle {
    engine: Box<dyn OcrEngine>,
    language: String,
}

/// Owns the single OCR engine of the offscreen context.
///
/// The lock is held across construction, reinitialization and recognition,
/// so jobs run one at a time and concurrent first requests build one engine.
pub struct OcrWorkerPool {
    factory: Arc<dyn OcrEngineFactory>,
    handle: Mutex<Option<EngineHandle>>,
}

impl OcrWorkerPool {
    pub fn new(factory: Arc<dyn OcrEngineFactory>) -> Self {
        Self {
            factory,
            handle: Mutex::new(None),
        }
    }

    pub async fn current_language(&self) -> Option<String> {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.language.clone())
    }

    /// Prepares the engine for `language` without recognizing anything.
    /// Returns the language the engine ended up with.
    pub async fn warm_up(&self, language: &str) -> Result<String> {
        let mut slot = self.handle.lock().await;
        let handle = self.prepare(&mut slot, language).await?;
        Ok(handle.language.clone())
    }

    pub async fn recognize(&self, image: &EncodedImage, language: &str) -> Result<OcrOutcome> {
        let decoded = image.decode().map_err(CoordinatorError::image)?;

        let mut slot = self.handle.lock().await;
        let handle = self.prepare(&mut slot, language).await?;

        log::debug!(
            "{} Recognizing {}x{} image in '{}'",
            LOG_TAG_WORKER_POOL,
            decoded.width(),
            decoded.height(),
            handle.language
        );

        let recognized = handle.engine.recognize(&decoded).await.map_err(|error| {
            log::error!("{} Recognition failed: {:#}", LOG_TAG_WORKER_POOL, error);
            CoordinatorError::Recognition(format!("{:#}", error))
        })?;

        let outcome = OcrOutcome::from_recognized(recognized, &handle.language);
        log::info!(
            "{} Recognized {} chars at {:.1}% confidence ({})",
            LOG_TAG_WORKER_POOL,
            outcome.text.chars().count(),
            outcome.confidence,
            outcome.language
        );
        Ok(outcome)
    }

    async fn prepare<'a>(
        &self,
        slot: &'a mut Option<EngineHandle>,
        language: &str,
    ) -> Result<&'a mut EngineHandle> {
        match slot.as_mut() {
            Some(handle) if handle.language == language => {
                log::debug!("{} Reusing engine for '{}'", LOG_TAG_WORKER_POOL, language);
            }
            Some(handle) => {
                log::info!(
                    "{} Switching engine from '{}' to '{}'",
                    LOG_TAG_WORKER_POOL,
                    handle.language,
                    language
                );
                match handle.engine.reinitialize(language).await {
                    Ok(()) => handle.language = language.to_string(),
                    Err(error) => log::warn!(
                        "{} Could not load '{}', staying on '{}': {:#}",
                        LOG_TAG_WORKER_POOL,
                        language,
                        handle.language,
                        error
                    ),
                }
            }
            None => {
                log::info!("{} Creating engine for '{}'", LOG_TAG_WORKER_POOL, language);
                let engine = self.factory.create_engine(language).await.map_err(|error| {
                    log::error!("{} Engine construction failed: {:#}", LOG_TAG_WORKER_POOL, error);
                    CoordinatorError::EngineInitialization(format!("{:#}", error))
                })?;
                *slot = Some(EngineHandle {
                    engine,
                    language: language.to_string(),
                });
            }
        }

        slot.as_mut()
            .ok_or_else(|| CoordinatorError::EngineInitialization("engine slot is empty".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::models::RecognizedText;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that echoes its language; languages in `broken` fail to load.
    pub struct ScriptedEngine {
        language: String,
        broken: HashSet<String>,
        reinits: Arc<AtomicUsize>,
        fail_recognition: bool,
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        async fn reinitialize(&mut self, language: &str) -> anyhow::Result<()> {
            self.reinits.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(language) {
                anyhow::bail!("traineddata for '{}' is missing", language);
            }
            self.language = language.to_string();
            Ok(())
        }

        async fn recognize(&self, _image: &DynamicImage) -> anyhow::Result<RecognizedText> {
            if self.fail_recognition {
                anyhow::bail!("engine crashed");
            }
            Ok(RecognizedText::new(format!("  text in {}\n", self.language), 88.0))
        }
    }

    #[derive(Default)]
    pub struct ScriptedEngineFactory {
        pub constructions: AtomicUsize,
        pub reinits: Arc<AtomicUsize>,
        pub broken: HashSet<String>,
        pub fail_recognition: bool,
    }

    impl ScriptedEngineFactory {
        pub fn with_broken(languages: &[&str]) -> Self {
            Self {
                broken: languages.iter().map(|language| language.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn constructions(&self) -> usize {
            self.constructions.load(Ordering::SeqCst)
        }

        pub fn reinits(&self) -> usize {
            self.reinits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OcrEngineFactory for ScriptedEngineFactory {
        async fn create_engine(&self, language: &str) -> anyhow::Result<Box<dyn OcrEngine>> {
            if self.broken.contains(language) {
                anyhow::bail!("traineddata for '{}' is missing", language);
            }
            tokio::task::yield_now().await;
            self.constructions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedEngine {
                language: language.to_string(),
                broken: self.broken.clone(),
                reinits: Arc::clone(&self.reinits),
                fail_recognition: self.fail_recognition,
            }))
        }
    }

    pub fn sample_image() -> EncodedImage {
        let image = DynamicImage::new_rgba8(8, 8);
        EncodedImage::from_image(&image).unwrap()
    }
}
