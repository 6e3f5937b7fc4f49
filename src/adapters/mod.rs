mod in_memory_storage;
mod json_file_storage;
mod simulated_browser;
mod tesseract_engine;

pub use in_memory_storage::InMemoryStorage;
pub use json_file_storage::JsonFileStorage;
pub use simulated_browser::SimulatedBrowser;
pub use tesseract_engine::{TesseractEngine, TesseractEngineFactory};
