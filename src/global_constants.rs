pub const APPLICATION_NAME: &str = "Screenshot Reader";
pub const APPLICATION_DIR_NAME: &str = "screenshot-reader";

pub const LOG_TAG_COORDINATOR: &str = "[COORDINATOR]";
pub const LOG_TAG_CAPTURE: &str = "[CAPTURE]";
pub const LOG_TAG_GATE: &str = "[CONTENT_GATE]";
pub const LOG_TAG_BACKUP: &str = "[BACKUP_TAB]";
pub const LOG_TAG_OFFSCREEN: &str = "[OFFSCREEN]";
pub const LOG_TAG_WORKER_POOL: &str = "[WORKER_POOL]";
pub const LOG_TAG_ROUTER: &str = "[ROUTER]";
pub const LOG_TAG_SESSION: &str = "[SESSION]";
pub const LOG_TAG_LANGUAGE: &str = "[LANGUAGE]";
pub const LOG_TAG_STORAGE: &str = "[STORAGE]";
pub const LOG_TAG_TESSERACT: &str = "[TESSERACT]";
pub const LOG_TAG_BROWSER: &str = "[SIM_BROWSER]";
pub const LOG_TAG_RESTRICTION: &str = "[RESTRICTION]";
pub const LOG_TAG_CROP: &str = "[CROP]";
pub const LOG_TAG_MAIN: &str = "[MAIN]";

pub const BACKUP_PAGE_PATH: &str = "backup.html";
pub const CONTENT_SCRIPT_PATH: &str = "content.js";
pub const OFFSCREEN_DOCUMENT_PATH: &str = "offscreen.html";
pub const OFFSCREEN_JUSTIFICATION: &str = "Processing screenshot image data for OCR";
pub const SHORTCUTS_PAGE_URL: &str = "chrome://extensions/shortcuts";
pub const ACTION_COMMAND_NAME: &str = "_execute_action";

pub const STORAGE_KEY_TAB_ID: &str = "tabId";
pub const STORAGE_KEY_CAPTURED_IMAGE: &str = "capturedImage";
pub const STORAGE_KEY_CROPPED_IMAGE: &str = "croppedImage";
pub const STORAGE_KEY_ISLAND_SETTINGS: &str = "islandSettings";
pub const STORAGE_FILE_NAME: &str = "storage.json";

pub const CAPTURE_MIME_TYPE: &str = "image/png";

pub const MIN_SELECTION_WIDTH: f64 = 5.0;
pub const MIN_SELECTION_HEIGHT: f64 = 5.0;

pub const DEFAULT_OCR_LANGUAGE: &str = "eng";
pub const DEFAULT_AUTO_COPY: bool = true;
pub const DEFAULT_AUTO_EXPAND: bool = false;

pub const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "devtools",
    "edge",
    "brave",
    "opera",
    "vivaldi",
    "about",
    "view-source",
    "file",
];

pub const RESTRICTED_HOSTS: &[&str] = &[
    "chrome.google.com",
    "chromewebstore.google.com",
    "microsoftedge.microsoft.com",
];

pub const MESSAGE_NO_RECEIVER: &str =
    "Could not establish connection. Receiving end does not exist.";
pub const MESSAGE_SUPERSEDED: &str = "superseded by a newer selection";
pub const MESSAGE_UNANSWERED: &str = "handler finished without sending a response";
pub const MESSAGE_PONG: &str = "pong";
