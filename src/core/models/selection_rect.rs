use serde::{Deserialize, Serialize};

use crate::global_constants::{MIN_SELECTION_HEIGHT, MIN_SELECTION_WIDTH};

/// Rectangle dragged by the user, in CSS pixels of the visible page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

/// Region of the captured bitmap, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SelectionRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn meets_minimum_size(&self) -> bool {
        self.width > MIN_SELECTION_WIDTH && self.height > MIN_SELECTION_HEIGHT
    }

    pub fn effective_pixel_ratio(&self) -> f64 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }

    /// Scales the selection into bitmap pixels and clamps it to the bitmap.
    /// Returns `None` when nothing of the selection lies inside the bitmap.
    pub fn to_pixel_region(&self, bitmap_width: u32, bitmap_height: u32) -> Option<PixelRegion> {
        let coordinates = [self.x, self.y, self.width, self.height];
        if coordinates.iter().any(|value| !value.is_finite()) {
            return None;
        }

        let scale = self.effective_pixel_ratio();
        let left = (self.x * scale).round().max(0.0);
        let top = (self.y * scale).round().max(0.0);
        let right = ((self.x + self.width) * scale)
            .round()
            .min(f64::from(bitmap_width));
        let bottom = ((self.y + self.height) * scale)
            .round()
            .min(f64::from(bitmap_height));

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRegion {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}
