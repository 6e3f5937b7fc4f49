use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use rusty_tesseract::{Args, Image as TesseractImage};

use crate::core::interfaces::adapters::{OcrEngine, OcrEngineFactory};
use crate::core::models::RecognizedText;
use crate::global_constants::LOG_TAG_TESSERACT;

const TESSERACT_DPI: i32 = 150;
// Single uniform block of text: selections are usually a paragraph or less.
const TESSERACT_PAGE_SEGMENTATION: i32 = 6;
const TESSERACT_ENGINE_MODE: i32 = 3;

pub struct TesseractEngineFactory;

impl TesseractEngineFactory {
    pub fn build() -> Self {
        log::info!("{} Using system Tesseract", LOG_TAG_TESSERACT);
        Self
    }
}

#[async_trait]
impl OcrEngineFactory for TesseractEngineFactory {
    async fn create_engine(&self, language: &str) -> Result<Box<dyn OcrEngine>> {
        ensure_language_installed(language).await?;
        log::info!("{} Engine ready for '{}'", LOG_TAG_TESSERACT, language);
        Ok(Box::new(TesseractEngine {
            language: language.to_string(),
        }))
    }
}

/// Tesseract is a subprocess per call, so "the engine" is only the
/// language it is configured for.
pub struct TesseractEngine {
    language: String,
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn reinitialize(&mut self, language: &str) -> Result<()> {
        ensure_language_installed(language).await?;
        log::info!(
            "{} Switched from '{}' to '{}'",
            LOG_TAG_TESSERACT,
            self.language,
            language
        );
        self.language = language.to_string();
        Ok(())
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText> {
        log::info!("{} Starting text extraction", LOG_TAG_TESSERACT);
        log::debug!(
            "{} Image dimensions: {}x{}",
            LOG_TAG_TESSERACT,
            image.width(),
            image.height()
        );

        let image = image.clone();
        let args = build_args(&self.language);

        let recognized = tokio::task::spawn_blocking(move || -> Result<RecognizedText> {
            let tesseract_image = TesseractImage::from_dynamic_image(&image)
                .context("Failed to create Tesseract image")?;

            let text = rusty_tesseract::image_to_string(&tesseract_image, &args)
                .context("Failed to extract text from image")?;
            let data = rusty_tesseract::image_to_data(&tesseract_image, &args)
                .context("Failed to read word confidences")?;

            let confidence =
                mean_word_confidence(data.data.iter().map(|word| (word.conf, word.text.as_str())));
            Ok(RecognizedText::new(text, confidence))
        })
        .await
        .context("Tesseract worker stopped unexpectedly")??;

        log::info!(
            "{} Text extraction complete. Extracted {} characters",
            LOG_TAG_TESSERACT,
            recognized.text.len()
        );
        Ok(recognized)
    }
}

fn build_args(language: &str) -> Args {
    Args {
        lang: language.to_string(),
        config_variables: HashMap::new(),
        dpi: Some(TESSERACT_DPI),
        psm: Some(TESSERACT_PAGE_SEGMENTATION),
        oem: Some(TESSERACT_ENGINE_MODE),
    }
}

async fn ensure_language_installed(language: &str) -> Result<()> {
    let installed = tokio::task::spawn_blocking(rusty_tesseract::get_tesseract_langs)
        .await
        .context("Tesseract language lookup stopped unexpectedly")?
        .context("Failed to list installed Tesseract languages")?;

    if !installed.iter().any(|installed_language| installed_language == language) {
        anyhow::bail!(
            "Tesseract language '{}' is not installed (have: {})",
            language,
            installed.join(", ")
        );
    }
    Ok(())
}

/// Mean confidence over recognized words. Tesseract reports -1 for layout
/// rows, which carry no text.
fn mean_word_confidence<'a>(words: impl IntoIterator<Item = (f32, &'a str)>) -> f32 {
    let (sum, count) = words
        .into_iter()
        .filter(|(confidence, text)| *confidence >= 0.0 && !text.trim().is_empty())
        .fold((0.0_f32, 0_u32), |(sum, count), (confidence, _)| {
            (sum + confidence, count + 1)
        });

    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_confidence_skips_layout_rows_and_blank_words() {
        let words = [(-1.0, ""), (90.0, "Hello"), (80.0, "World"), (95.0, "  ")];

        assert_eq!(mean_word_confidence(words), 85.0);
    }

    #[test]
    fn test_mean_confidence_of_nothing_is_zero() {
        assert_eq!(mean_word_confidence(std::iter::empty()), 0.0);
        assert_eq!(mean_word_confidence([(-1.0, "")]), 0.0);
    }

    #[test]
    fn test_args_carry_language() {
        let args = build_args("fra");

        assert_eq!(args.lang, "fra");
        assert_eq!(args.psm, Some(TESSERACT_PAGE_SEGMENTATION));
    }
}
