mod ocr_engine;

pub use ocr_engine::{OcrEngine, OcrEngineFactory};
