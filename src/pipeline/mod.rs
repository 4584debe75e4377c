//! End-to-end report processing: PDF in, classified results out.
//!
//! The extraction phase (text layer, optional OCR fallback) runs under a
//! retry policy; catalog loading and parsing run outside it, since neither
//! gets better with repetition.

pub mod retry;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogCache, ReferenceError};
use crate::extract::{
    CompositeOcrEngine, EmbeddedScanSource, ExtractionError, OcrEngine, PagePreprocessor,
    PageImageSource, PdfSource, PdfTextExtractor, PreprocessOptions, TextBlock,
};
use crate::parse::{LabResult, PatientInfo, StructuredParser};

pub use retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("reference catalog error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("extraction failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// OCR every page even when the text layer yields content.
    pub require_ocr: bool,
    /// Hard cap on OCR'd pages; scanned reports past this are truncated.
    pub max_ocr_pages: usize,
    pub ocr_dpi: u32,
    pub preprocess: PreprocessOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            require_ocr: false,
            max_ocr_pages: 10,
            ocr_dpi: 300,
            preprocess: PreprocessOptions::default(),
        }
    }
}

/// What extraction actually saw, kept for debugging and AI handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    pub raw_text: String,
    pub block_count: usize,
    /// Mean OCR confidence over OCR'd pages, absent when OCR never ran.
    pub ocr_confidence: Option<f32>,
    pub ocr_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub patient: PatientInfo,
    pub results: Vec<LabResult>,
    pub suggestions: Vec<String>,
    pub artifact: ExtractionArtifact,
}

/// Orchestrates extraction, parsing and classification.
///
/// All collaborators sit behind traits so tests can run the full flow with
/// mocks and no Tesseract installation.
pub struct LabPipeline {
    pdf: Box<dyn PdfSource>,
    pages: Box<dyn PageImageSource>,
    preprocessor: PagePreprocessor,
    ocr: Box<dyn OcrEngine>,
    catalogs: CatalogCache,
    retry: RetryPolicy,
    options: PipelineOptions,
}

impl LabPipeline {
    /// Production wiring: pdf-extract text layer, embedded-scan rasterizer,
    /// full preprocessing, the default OCR stack.
    pub fn standard(options: PipelineOptions) -> Self {
        let backends: Vec<Box<dyn OcrEngine>> = vec![
            #[cfg(feature = "ocr")]
            Box::new(crate::extract::TesseractOcr::new()),
        ];
        let preprocessor = PagePreprocessor::from_options(&options.preprocess);
        Self {
            pdf: Box::new(PdfTextExtractor),
            pages: Box::new(EmbeddedScanSource),
            preprocessor,
            ocr: Box::new(CompositeOcrEngine::new(backends)),
            catalogs: CatalogCache::default(),
            retry: RetryPolicy::transient(),
            options,
        }
    }

    /// Assemble a pipeline from explicit collaborators.
    pub fn with_services(
        pdf: Box<dyn PdfSource>,
        pages: Box<dyn PageImageSource>,
        ocr: Box<dyn OcrEngine>,
        retry: RetryPolicy,
        options: PipelineOptions,
    ) -> Self {
        let preprocessor = PagePreprocessor::from_options(&options.preprocess);
        Self {
            pdf,
            pages,
            preprocessor,
            ocr,
            catalogs: CatalogCache::default(),
            retry,
            options,
        }
    }

    /// Process one report against one reference file.
    pub fn run(
        &self,
        pdf_path: &Path,
        references_path: &Path,
        gender: Option<&str>,
    ) -> Result<ExtractionResult, PipelineError> {
        // A missing or malformed catalog fails the run before any PDF work,
        // and never retries.
        let catalog = self.catalogs.get_or_load(references_path)?;

        let pdf_bytes = std::fs::read(pdf_path)
            .map_err(ExtractionError::from)
            .map_err(PipelineError::from)?;

        let (blocks, artifact) = self.retry.run(|| self.extract_once(&pdf_bytes))?;

        let parser = StructuredParser::new(Arc::clone(&catalog));
        let report = parser.parse(&blocks, gender);

        info!(
            pdf = %pdf_path.display(),
            results = report.results.len(),
            suggestions = report.suggestions.len(),
            ocr_pages = artifact.ocr_pages,
            "Pipeline run complete"
        );

        Ok(ExtractionResult {
            patient: report.patient,
            results: report.results,
            suggestions: report.suggestions,
            artifact,
        })
    }

    /// One extraction attempt: text layer first, OCR when the layer is blank
    /// or the caller demands it.
    fn extract_once(
        &self,
        pdf_bytes: &[u8],
    ) -> Result<(Vec<TextBlock>, ExtractionArtifact), PipelineError> {
        let mut blocks = self.pdf.extract_blocks(pdf_bytes)?;
        let native_text: String = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut raw_text = native_text.clone();
        let mut ocr_confidence = None;
        let mut ocr_pages = 0usize;

        if self.options.require_ocr || native_text.trim().is_empty() {
            let outcome = self.ocr_pass(pdf_bytes, &mut blocks)?;
            ocr_pages = outcome.pages;
            ocr_confidence = outcome.mean_confidence;
            if !outcome.text.is_empty() {
                if !raw_text.is_empty() {
                    raw_text.push('\n');
                }
                raw_text.push_str(&outcome.text);
            }
        }

        let artifact = ExtractionArtifact {
            block_count: blocks.len(),
            raw_text,
            ocr_confidence,
            ocr_pages,
        };
        Ok((blocks, artifact))
    }

    fn ocr_pass(
        &self,
        pdf_bytes: &[u8],
        blocks: &mut Vec<TextBlock>,
    ) -> Result<OcrPass, PipelineError> {
        let page_count = self.pdf.page_count(pdf_bytes)?;
        let limit = page_count.min(self.options.max_ocr_pages);
        if limit < page_count {
            warn!(page_count, limit, "OCR page cap reached, truncating");
        }

        // Preprocessed pages land in a scratch dir that is deleted on every
        // exit path, including errors.
        let scratch = tempfile::tempdir().map_err(ExtractionError::from)?;

        let mut text = String::new();
        let mut confidences = Vec::new();
        for page in 1..=limit {
            let image = match self.pages.page_image(pdf_bytes, page, self.options.ocr_dpi) {
                Ok(img) => img,
                Err(e) => {
                    // A page without a usable scan image is skipped, not fatal.
                    warn!(page, error = %e, "Page rasterization failed, skipping");
                    continue;
                }
            };
            let cleaned = self.preprocessor.run(image);
            let page_path = scratch.path().join(format!("page-{page:03}.png"));
            if let Err(e) = cleaned.save(&page_path) {
                debug!(page, error = %e, "Could not persist preprocessed page");
            }

            let outcome = match self.ocr.extract_text(&cleaned) {
                Ok(o) => o,
                Err(e) => {
                    warn!(page, error = %e, "OCR failed on page, skipping");
                    continue;
                }
            };
            if outcome.is_blank() {
                continue;
            }
            confidences.push(outcome.confidence);
            for line in outcome.text.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                blocks.push(TextBlock {
                    text: trimmed.to_string(),
                    page_number: page,
                    bounding_box: None,
                });
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(outcome.text.trim_end());
        }

        let pages = confidences.len();
        let mean_confidence = if pages > 0 {
            Some(confidences.iter().sum::<f32>() / pages as f32)
        } else {
            None
        };
        debug!(pages, limit, "OCR pass complete");
        Ok(OcrPass {
            text,
            pages,
            mean_confidence,
        })
    }
}

struct OcrPass {
    text: String,
    pages: usize,
    mean_confidence: Option<f32>,
}
