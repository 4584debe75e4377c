//! OCR backends and first-success composition.

use image::GrayImage;
use tracing::warn;

use super::types::{OcrEngine, OcrOutcome};
use super::ExtractionError;

/// Target corpus is Brazilian lab reports with occasional English analyte
/// names, so both models are loaded together.
pub const DEFAULT_OCR_LANG: &str = "por+eng";

/// Tesseract-backed engine. Only available with the `ocr` feature.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            lang: DEFAULT_OCR_LANG.to_string(),
        }
    }

    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = langs.to_string();
        self
    }
}

#[cfg(feature = "ocr")]
impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn extract_text(&self, image: &GrayImage) -> Result<OcrOutcome, ExtractionError> {
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encode failed: {e}")))?;

        let tess = tesseract::Tesseract::new(None, Some(&self.lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        // PSM 6: assume a uniform block of text — lab reports are line-oriented.
        let tess = tess
            .set_variable("tessedit_pageseg_mode", "6")
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(png.get_ref())
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;
        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrOutcome {
            text,
            confidence,
            language: self.lang.clone(),
            page_count: 1,
        })
    }
}

/// Tries an ordered list of backends, returning the first result with
/// non-blank text.
///
/// All backends blank → a zero-confidence empty outcome (`Ok`): a blank page
/// is a valid reading, not a failure. A backend error moves on to the next
/// backend; only when every backend errors does the last error surface.
pub struct CompositeOcrEngine {
    backends: Vec<Box<dyn OcrEngine>>,
}

impl CompositeOcrEngine {
    pub fn new(backends: Vec<Box<dyn OcrEngine>>) -> Self {
        Self { backends }
    }
}

impl OcrEngine for CompositeOcrEngine {
    fn extract_text(&self, image: &GrayImage) -> Result<OcrOutcome, ExtractionError> {
        let mut last_error: Option<ExtractionError> = None;
        let mut any_succeeded = false;

        for (i, backend) in self.backends.iter().enumerate() {
            match backend.extract_text(image) {
                Ok(outcome) if !outcome.is_blank() => return Ok(outcome),
                Ok(_) => any_succeeded = true,
                Err(e) => {
                    warn!(backend = i, error = %e, "OCR backend failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(OcrOutcome::empty()),
        }
    }
}

/// Fixed-output OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }

    pub fn blank() -> Self {
        Self::new("", 0.0)
    }
}

impl OcrEngine for MockOcrEngine {
    fn extract_text(&self, _image: &GrayImage) -> Result<OcrOutcome, ExtractionError> {
        Ok(OcrOutcome {
            text: self.text.clone(),
            confidence: self.confidence,
            language: DEFAULT_OCR_LANG.to_string(),
            page_count: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn extract_text(&self, _image: &GrayImage) -> Result<OcrOutcome, ExtractionError> {
            Err(ExtractionError::OcrProcessing("backend down".into()))
        }
    }

    fn img() -> GrayImage {
        GrayImage::new(10, 10)
    }

    #[test]
    fn composite_falls_through_to_non_blank() {
        let engine = CompositeOcrEngine::new(vec![
            Box::new(MockOcrEngine::blank()),
            Box::new(MockOcrEngine::new("Glicose 90", 0.88)),
        ]);
        let outcome = engine.extract_text(&img()).unwrap();
        assert_eq!(outcome.text, "Glicose 90");
        assert!((outcome.confidence - 0.88).abs() < f32::EPSILON);
    }

    #[test]
    fn composite_all_blank_is_empty_not_error() {
        let engine = CompositeOcrEngine::new(vec![
            Box::new(MockOcrEngine::blank()),
            Box::new(MockOcrEngine::new("   \n", 0.7)),
        ]);
        let outcome = engine.extract_text(&img()).unwrap();
        assert!(outcome.is_blank());
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn composite_skips_failing_backend() {
        let engine = CompositeOcrEngine::new(vec![
            Box::new(FailingOcr),
            Box::new(MockOcrEngine::new("Hemoglobina 14", 0.8)),
        ]);
        let outcome = engine.extract_text(&img()).unwrap();
        assert_eq!(outcome.text, "Hemoglobina 14");
    }

    #[test]
    fn composite_all_failing_surfaces_last_error() {
        let engine = CompositeOcrEngine::new(vec![Box::new(FailingOcr), Box::new(FailingOcr)]);
        assert!(matches!(
            engine.extract_text(&img()),
            Err(ExtractionError::OcrProcessing(_))
        ));
    }

    #[test]
    fn composite_error_then_blank_is_empty() {
        let engine = CompositeOcrEngine::new(vec![
            Box::new(FailingOcr),
            Box::new(MockOcrEngine::blank()),
        ]);
        let outcome = engine.extract_text(&img()).unwrap();
        assert!(outcome.is_blank());
    }

    #[test]
    fn composite_no_backends_is_empty() {
        let engine = CompositeOcrEngine::new(vec![]);
        assert!(engine.extract_text(&img()).unwrap().is_blank());
    }
}
