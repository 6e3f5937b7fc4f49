use std::fmt;

use super::encoded_image::EncodedImage;
use super::tab::TabId;

/// State of the one active capture-to-OCR flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub owner_tab_id: Option<TabId>,
    pub captured_image: Option<EncodedImage>,
    pub cropped_image: Option<EncodedImage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Capturing,
    Activating,
    CreatingBackupTab,
    OverlayActive,
    Cropped,
    RecognizingOcr,
    ResultDelivered,
}

impl SessionPhase {
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        match (self, next) {
            (_, Idle) | (_, Capturing) => true,
            (Capturing, Activating) | (Capturing, CreatingBackupTab) => true,
            (Activating, OverlayActive) | (Activating, CreatingBackupTab) => true,
            (CreatingBackupTab, OverlayActive) => true,
            (OverlayActive, Cropped) => true,
            (Cropped, RecognizingOcr) => true,
            // A newer selection may arrive while the previous one is in flight.
            (RecognizingOcr, Cropped) | (ResultDelivered, Cropped) => true,
            (RecognizingOcr, ResultDelivered) => true,
            // Language change re-runs OCR on the stored crop.
            (ResultDelivered, RecognizingOcr) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
