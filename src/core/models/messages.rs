//! Messages exchanged between the coordinator, UI hosts and the offscreen
//! document. The wire shape is `{ "action": "...", "payload": {...} }`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::encoded_image::EncodedImage;
use super::ocr::OcrOutcome;
use super::selection_rect::SelectionRect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionAction {
    ActivateOverlay,
    InitializeBackup,
    CaptureSuccess,
    ShowCrop,
    OcrResult,
    PerformOcr,
    WarmUpEngine,
    RequestLanguageUpdate,
    EnsureOffscreen,
    PingContent,
    PingOffscreen,
    GetShortcut,
    OpenShortcutsPage,
    CleanupStorage,
}

impl fmt::Display for ExtensionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtensionAction::ActivateOverlay => "ACTIVATE_OVERLAY",
            ExtensionAction::InitializeBackup => "INITIALIZE_BACKUP",
            ExtensionAction::CaptureSuccess => "CAPTURE_SUCCESS",
            ExtensionAction::ShowCrop => "SHOW_CROP",
            ExtensionAction::OcrResult => "OCR_RESULT",
            ExtensionAction::PerformOcr => "PERFORM_OCR",
            ExtensionAction::WarmUpEngine => "WARM_UP_ENGINE",
            ExtensionAction::RequestLanguageUpdate => "REQUEST_LANGUAGE_UPDATE",
            ExtensionAction::EnsureOffscreen => "ENSURE_OFFSCREEN",
            ExtensionAction::PingContent => "PING_CONTENT",
            ExtensionAction::PingOffscreen => "PING_OFFSCREEN",
            ExtensionAction::GetShortcut => "GET_SHORTCUT",
            ExtensionAction::OpenShortcutsPage => "OPEN_SHORTCUTS_PAGE",
            ExtensionAction::CleanupStorage => "CLEANUP_STORAGE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<EncodedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropPayload {
    pub cropped_image_url: EncodedImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformOcrPayload {
    pub image: EncodedImage,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguagePayload {
    pub language: String,
}

/// Final result pushed to the tab that owns the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResultPayload {
    pub success: bool,
    pub text: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropped_image_url: Option<EncodedImage>,
}

impl OcrResultPayload {
    pub fn succeeded(outcome: &OcrOutcome, cropped_image: EncodedImage) -> Self {
        Self {
            success: true,
            text: outcome.text.clone(),
            confidence: outcome.confidence,
            language: Some(outcome.language.clone()),
            cropped_image_url: Some(cropped_image),
        }
    }

    pub fn failed(reason: impl Into<String>, image_context: Option<EncodedImage>) -> Self {
        Self {
            success: false,
            text: reason.into(),
            confidence: 0.0,
            language: None,
            cropped_image_url: image_context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    ActivateOverlay(ImagePayload),
    InitializeBackup(ImagePayload),
    CaptureSuccess(SelectionRect),
    ShowCrop(CropPayload),
    OcrResult(OcrResultPayload),
    PerformOcr(PerformOcrPayload),
    WarmUpEngine(LanguagePayload),
    RequestLanguageUpdate(LanguagePayload),
    EnsureOffscreen,
    PingContent,
    PingOffscreen,
    GetShortcut,
    OpenShortcutsPage,
    CleanupStorage,
}

impl ExtensionMessage {
    pub fn action(&self) -> ExtensionAction {
        match self {
            ExtensionMessage::ActivateOverlay(_) => ExtensionAction::ActivateOverlay,
            ExtensionMessage::InitializeBackup(_) => ExtensionAction::InitializeBackup,
            ExtensionMessage::CaptureSuccess(_) => ExtensionAction::CaptureSuccess,
            ExtensionMessage::ShowCrop(_) => ExtensionAction::ShowCrop,
            ExtensionMessage::OcrResult(_) => ExtensionAction::OcrResult,
            ExtensionMessage::PerformOcr(_) => ExtensionAction::PerformOcr,
            ExtensionMessage::WarmUpEngine(_) => ExtensionAction::WarmUpEngine,
            ExtensionMessage::RequestLanguageUpdate(_) => ExtensionAction::RequestLanguageUpdate,
            ExtensionMessage::EnsureOffscreen => ExtensionAction::EnsureOffscreen,
            ExtensionMessage::PingContent => ExtensionAction::PingContent,
            ExtensionMessage::PingOffscreen => ExtensionAction::PingOffscreen,
            ExtensionMessage::GetShortcut => ExtensionAction::GetShortcut,
            ExtensionMessage::OpenShortcutsPage => ExtensionAction::OpenShortcutsPage,
            ExtensionMessage::CleanupStorage => ExtensionAction::CleanupStorage,
        }
    }

    pub fn activate_overlay(image: Option<EncodedImage>) -> Self {
        ExtensionMessage::ActivateOverlay(ImagePayload { image_url: image })
    }

    pub fn initialize_backup(image: EncodedImage) -> Self {
        ExtensionMessage::InitializeBackup(ImagePayload {
            image_url: Some(image),
        })
    }

    pub fn perform_ocr(image: EncodedImage, language: impl Into<String>) -> Self {
        ExtensionMessage::PerformOcr(PerformOcrPayload {
            image,
            language: language.into(),
        })
    }

    pub fn request_language_update(language: impl Into<String>) -> Self {
        ExtensionMessage::RequestLanguageUpdate(LanguagePayload {
            language: language.into(),
        })
    }

    pub fn warm_up_engine(language: impl Into<String>) -> Self {
        ExtensionMessage::WarmUpEngine(LanguagePayload {
            language: language.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Ok,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropped_image_url: Option<EncodedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Reply shape shared by `PERFORM_OCR` and `REQUEST_LANGUAGE_UPDATE`;
    /// the recognized text travels in `message`.
    pub fn from_outcome(outcome: &OcrOutcome) -> Self {
        Self {
            status: ResponseStatus::Ok,
            message: Some(outcome.text.clone()),
            confidence: Some(outcome.confidence),
            language: Some(outcome.language.clone()),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Reads an OCR reply back into an outcome. Error replies and replies
    /// without text are rejected with the reply's message.
    pub fn into_outcome(self, requested_language: &str) -> Result<OcrOutcome, String> {
        if !self.is_ok() {
            return Err(self
                .message
                .unwrap_or_else(|| "OCR request failed".to_string()));
        }

        Ok(OcrOutcome {
            text: self.message.unwrap_or_default(),
            confidence: self.confidence.unwrap_or_default(),
            language: self
                .language
                .unwrap_or_else(|| requested_language.to_string()),
        })
    }
}
