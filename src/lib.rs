//! Extraction and interpretation of Brazilian lab-report PDFs.
//!
//! The flow: a reference catalog ([`catalog`]) defines the analytes worth
//! looking for; [`extract`] turns a PDF into text blocks, falling back to
//! image preprocessing plus OCR for scanned documents; [`parse`] matches the
//! blocks against the catalog and classifies each value; [`pipeline`] wires
//! it all together with retries. [`ai`] holds the handoff types for an
//! external summarization service.

pub mod ai;
pub mod catalog;
pub mod extract;
pub mod parse;
pub mod pipeline;

pub use catalog::{CatalogCache, RangeBounds, ReferenceCatalog, ReferenceError, Status};
pub use extract::ExtractionError;
pub use parse::{LabResult, ParsedReport, PatientInfo, StructuredParser};
pub use pipeline::{ExtractionResult, LabPipeline, PipelineError, PipelineOptions};
