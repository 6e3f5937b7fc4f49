//! Error taxonomy for the capture-to-OCR pipeline.

use std::fmt;

use thiserror::Error;

use crate::global_constants::{
    STORAGE_KEY_CAPTURED_IMAGE, STORAGE_KEY_CROPPED_IMAGE, STORAGE_KEY_TAB_ID,
};

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Pieces of session state that a request may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    OwnerTab,
    CapturedImage,
    CroppedImage,
}

impl StateKey {
    pub fn storage_key(&self) -> &'static str {
        match self {
            StateKey::OwnerTab => STORAGE_KEY_TAB_ID,
            StateKey::CapturedImage => STORAGE_KEY_CAPTURED_IMAGE,
            StateKey::CroppedImage => STORAGE_KEY_CROPPED_IMAGE,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Capture, tab creation or another host call failed. Fatal to the session.
    #[error("Host primitive failed: {0}")]
    HostPrimitive(String),

    /// The page refused the UI host script. Recovered through a backup tab.
    #[error("Content script injection failed: {0}")]
    InjectionFailed(String),

    #[error("Offscreen document is not responding")]
    OffscreenUnavailable,

    #[error("OCR engine initialization failed: {0}")]
    EngineInitialization(String),

    #[error("OCR recognition failed: {0}")]
    Recognition(String),

    #[error("Missing required state: {0}")]
    MissingState(StateKey),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Unsupported OCR language: {0}")]
    UnsupportedLanguage(String),

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Messaging failed: {0}")]
    Messaging(String),
}

impl CoordinatorError {
    pub fn host(error: anyhow::Error) -> Self {
        CoordinatorError::HostPrimitive(format!("{:#}", error))
    }

    pub fn storage(error: anyhow::Error) -> Self {
        CoordinatorError::Storage(format!("{:#}", error))
    }

    pub fn messaging(error: anyhow::Error) -> Self {
        CoordinatorError::Messaging(format!("{:#}", error))
    }

    pub fn image(error: anyhow::Error) -> Self {
        CoordinatorError::Image(format!("{:#}", error))
    }

    /// Whether the session can continue on another path after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoordinatorError::InjectionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_names_the_storage_key() {
        let error = CoordinatorError::MissingState(StateKey::CroppedImage);

        assert_eq!(error.to_string(), "Missing required state: croppedImage");
    }

    #[test]
    fn test_host_error_keeps_context_chain() {
        let source = anyhow::anyhow!("permission denied").context("captureVisibleTab");

        let error = CoordinatorError::host(source);

        assert_eq!(
            error.to_string(),
            "Host primitive failed: captureVisibleTab: permission denied"
        );
    }

    #[test]
    fn test_only_injection_failure_is_recoverable() {
        assert!(CoordinatorError::InjectionFailed("blocked".to_string()).is_recoverable());
        assert!(!CoordinatorError::OffscreenUnavailable.is_recoverable());
        assert!(!CoordinatorError::MissingState(StateKey::OwnerTab).is_recoverable());
    }
}
