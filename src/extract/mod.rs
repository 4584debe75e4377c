pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod raster;
pub mod types;

#[cfg(feature = "ocr")]
pub use ocr::TesseractOcr;
pub use ocr::{CompositeOcrEngine, MockOcrEngine, DEFAULT_OCR_LANG};
pub use pdf::PdfTextExtractor;
pub use preprocess::{PagePreprocessor, PreprocessOptions};
pub use raster::EmbeddedScanSource;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),
}
