pub mod backup_tab;
pub mod capture_service;
pub mod content_script_gate;
pub mod language_resolver;
pub mod message_router;
pub mod ocr_worker_pool;
pub mod offscreen_lifecycle;
pub mod restriction_classifier;
pub mod session_store;

pub use backup_tab::BackupTabLauncher;
pub use capture_service::CaptureService;
pub use content_script_gate::{ContentScriptGate, GateOutcome};
pub use language_resolver::{resolve_language, LanguageResolver};
pub use message_router::{Dispatch, MessageRouter, ReplyHandle, ReplyMode};
pub use ocr_worker_pool::OcrWorkerPool;
pub use offscreen_lifecycle::{OffscreenLifecycleManager, OffscreenReadiness, OffscreenState};
pub use restriction_classifier::is_restricted_url;
pub use session_store::SessionStore;
