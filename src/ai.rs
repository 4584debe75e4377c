//! Interface types for an external AI summarization service.
//!
//! The service itself lives elsewhere; this module only defines the payload
//! the pipeline hands over, the shape of what comes back, and the heuristic
//! the caller uses to decide whether the answer is worth keeping.

use serde::{Deserialize, Serialize};

use crate::parse::{LabResult, PatientInfo};

/// Everything the summarizer gets to see about one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSummaryRequest {
    pub patient: PatientInfo,
    pub lab_results: Vec<LabResult>,
    /// Document lines that mentioned a catalog analyte, in document order.
    pub key_lines: Vec<String>,
    /// Leading slice of the raw extracted text, for context the structured
    /// results lost.
    pub raw_excerpt: String,
}

impl AiSummaryRequest {
    /// Raw text is clipped so the request stays prompt-sized even for long
    /// multi-page reports.
    pub const MAX_EXCERPT_CHARS: usize = 4000;

    pub fn new(
        patient: PatientInfo,
        lab_results: Vec<LabResult>,
        key_lines: Vec<String>,
        raw_text: &str,
    ) -> Self {
        let raw_excerpt = raw_text
            .char_indices()
            .nth(Self::MAX_EXCERPT_CHARS)
            .map(|(i, _)| &raw_text[..i])
            .unwrap_or(raw_text)
            .to_string();
        Self {
            patient,
            lab_results,
            key_lines,
            raw_excerpt,
        }
    }
}

/// Envelope from the service: either an analysis or an error string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSummaryResponse {
    pub ok: bool,
    pub analysis: Option<AiAnalysis>,
    pub error: Option<String>,
}

/// Structured summary as the service reports it. Field names follow the
/// service's Portuguese contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub paciente: Option<String>,
    #[serde(default)]
    pub exames: Vec<String>,
    #[serde(default)]
    pub resumo_clinico: Option<String>,
    #[serde(default)]
    pub prescricao: Vec<String>,
    #[serde(default)]
    pub orientacoes: Vec<String>,
    #[serde(default)]
    pub alertas: Vec<String>,
}

/// Implemented by whatever talks to the model.
pub trait SummaryService: Send + Sync {
    fn summarize(&self, request: &AiSummaryRequest) -> AiSummaryResponse;
}

/// Whether a response covered noticeably less than the document offered.
///
/// Callers holding a stronger fallback model use this to decide on a second
/// pass: a failed response is always sparse, and a successful one is sparse
/// when it discusses under half of the analytes the parser found (with a
/// floor of one for documents that had anything at all).
pub fn looks_sparse(response: &AiSummaryResponse, candidate_count: usize) -> bool {
    if !response.ok {
        return true;
    }
    let Some(analysis) = &response.analysis else {
        return true;
    };
    if candidate_count == 0 {
        return false;
    }
    let covered = analysis.exames.len();
    covered < (candidate_count / 2).max(1)
}
