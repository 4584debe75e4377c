use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// One positioned text block pulled from a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub page_number: usize,
    /// Present when the source provides layout geometry; the plain text
    /// layer of most lab PDFs does not.
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Result of one OCR call.
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub text: String,
    /// 0.0–1.0; 0.0 means nothing readable was found.
    pub confidence: f32,
    pub language: String,
    pub page_count: usize,
}

impl OcrOutcome {
    /// The valid "page is blank or unreadable" outcome — not an error.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            language: String::new(),
            page_count: 0,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Native text-layer access to a PDF (allows mocking for tests).
pub trait PdfSource: Send + Sync {
    /// Ordered text blocks from the embedded text layer.
    fn extract_blocks(&self, pdf_bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError>;

    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Rows of cell strings for any tabular region on one page.
    fn extract_table(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
    ) -> Result<Vec<Vec<String>>, ExtractionError>;
}

/// Produces a grayscale raster of one page for the OCR path.
pub trait PageImageSource: Send + Sync {
    fn page_image(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<GrayImage, ExtractionError>;
}

/// OCR engine abstraction; composable via `CompositeOcrEngine`.
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, image: &GrayImage) -> Result<OcrOutcome, ExtractionError>;
}
