mod encoded_image;
mod errors;
mod island_settings;
mod messages;
mod ocr;
mod selection_rect;
mod session;
mod tab;
mod user_language;

pub use encoded_image::EncodedImage;
pub use errors::{CoordinatorError, Result, StateKey};
pub use island_settings::IslandSettings;
pub use messages::{
    CropPayload, ExtensionAction, ExtensionMessage, ImagePayload, LanguagePayload,
    MessageResponse, OcrResultPayload, PerformOcrPayload, ResponseStatus,
};
pub use ocr::{OcrOutcome, RecognizedText};
pub use selection_rect::{PixelRegion, SelectionRect};
pub use session::{Session, SessionPhase};
pub use tab::{MessageSender, TabId, TabInfo, TabStatus, TabUpdate};
pub use user_language::{
    base_subtag, is_supported_language, language_for_locale, supported_languages, LanguageSource,
    UserLanguage,
};
