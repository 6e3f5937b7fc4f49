use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::errors::CoordinatorError;
use super::selection_rect::SelectionRect;
use crate::global_constants::{CAPTURE_MIME_TYPE, LOG_TAG_CROP};

/// An image as it travels between contexts: a base64 `data:` URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type())
            .field("length", &self.0.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        Ok(Self(format!(
            "data:{};base64,{}",
            CAPTURE_MIME_TYPE,
            BASE64.encode(&buffer)
        )))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> Option<&str> {
        let header = self.0.strip_prefix("data:")?.split(',').next()?;
        header.split(';').next().filter(|mime| !mime.is_empty())
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        let (header, payload) = self
            .0
            .split_once(',')
            .context("Image data URL has no payload separator")?;

        if !header.starts_with("data:image/") || !header.ends_with(";base64") {
            anyhow::bail!("Unsupported image data URL header: {}", header);
        }

        let bytes = BASE64
            .decode(payload.trim())
            .context("Image data URL payload is not valid base64")?;

        image::load_from_memory(&bytes).context("Failed to decode image bytes")
    }

    /// Cuts the selected region out of this (full-tab) image.
    pub fn crop_selection(
        &self,
        selection: &SelectionRect,
    ) -> std::result::Result<EncodedImage, CoordinatorError> {
        if !selection.meets_minimum_size() {
            return Err(CoordinatorError::InvalidSelection(format!(
                "selection {}x{} is below the minimum size",
                selection.width, selection.height
            )));
        }

        let image = self.decode().map_err(CoordinatorError::image)?;
        let region = selection
            .to_pixel_region(image.width(), image.height())
            .ok_or_else(|| {
                CoordinatorError::InvalidSelection(format!(
                    "selection at ({}, {}) lies outside the {}x{} capture",
                    selection.x,
                    selection.y,
                    image.width(),
                    image.height()
                ))
            })?;

        log::debug!(
            "{} Cropping {}x{} at ({}, {}) from {}x{}",
            LOG_TAG_CROP,
            region.width,
            region.height,
            region.x,
            region.y,
            image.width(),
            image.height()
        );

        let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
        EncodedImage::from_image(&cropped).map_err(CoordinatorError::image)
    }
}
