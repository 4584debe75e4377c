//! Native text-layer extraction via the pdf-extract crate.

use tracing::debug;

use super::types::{PdfSource, TextBlock};
use super::ExtractionError;

/// Blocks shorter than this (after trimming) are page-number droppings and
/// stray glyphs, not content.
const MIN_BLOCK_CHARS: usize = 2;

/// Text-layer extractor for digital PDFs.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    fn pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        if pages.is_empty() {
            return Err(ExtractionError::PdfParsing("document has no pages".into()));
        }
        Ok(pages)
    }
}

impl PdfSource for PdfTextExtractor {
    fn extract_blocks(&self, pdf_bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError> {
        let pages = self.pages(pdf_bytes)?;

        let mut blocks = Vec::new();
        for (i, page_text) in pages.iter().enumerate() {
            for line in page_text.lines() {
                let trimmed = line.trim();
                if trimmed.chars().count() < MIN_BLOCK_CHARS {
                    continue;
                }
                blocks.push(TextBlock {
                    text: trimmed.to_string(),
                    page_number: i + 1,
                    bounding_box: None,
                });
            }
        }

        debug!(pages = pages.len(), blocks = blocks.len(), "PDF text layer extracted");
        Ok(blocks)
    }

    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.pages(pdf_bytes)?.len())
    }

    fn extract_table(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
    ) -> Result<Vec<Vec<String>>, ExtractionError> {
        let pages = self.pages(pdf_bytes)?;
        let page_text = pages.get(page_number.saturating_sub(1)).ok_or_else(|| {
            ExtractionError::PdfParsing(format!(
                "page {page_number} not found (PDF has {} pages)",
                pages.len()
            ))
        })?;

        let rows: Vec<Vec<String>> = page_text
            .lines()
            .map(split_table_row)
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .filter(|cells| cells.len() >= 2)
            .collect();
        Ok(rows)
    }
}

/// Cell boundaries are runs of two or more spaces, or tabs.
fn split_table_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut space_run = 0usize;

    for c in line.chars() {
        match c {
            '\t' => {
                cells.push(current.trim().to_string());
                current.clear();
                space_run = 0;
            }
            ' ' => {
                space_run += 1;
                current.push(' ');
            }
            other => {
                if space_run >= 2 {
                    let cell = current[..current.len() - space_run].trim().to_string();
                    cells.push(cell);
                    current.clear();
                }
                space_run = 0;
                current.push(other);
            }
        }
    }
    cells.push(current.trim().to_string());
    cells.retain(|c| !c.is_empty());
    cells
}
