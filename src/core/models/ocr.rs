use serde::{Deserialize, Serialize};

/// Raw output of one recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f32,
}

impl RecognizedText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Recognition result as reported by the worker pool, tagged with the
/// language the engine was actually configured for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutcome {
    pub text: String,
    pub confidence: f32,
    pub language: String,
}

impl OcrOutcome {
    pub fn from_recognized(recognized: RecognizedText, language: &str) -> Self {
        Self {
            text: recognized.text.trim().to_string(),
            confidence: recognized.confidence,
            language: language.to_string(),
        }
    }
}
