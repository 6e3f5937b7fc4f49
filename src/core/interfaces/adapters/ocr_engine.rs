use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;

use crate::core::models::RecognizedText;

/// A live recognition engine configured for one language at a time.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Switches the loaded language in place. On error the engine keeps its
    /// previous language.
    async fn reinitialize(&mut self, language: &str) -> Result<()>;

    async fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText>;
}

#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    async fn create_engine(&self, language: &str) -> Result<Box<dyn OcrEngine>>;
}
