//! Structured lab-report parsing: text blocks in, patient metadata plus
//! classified analyte records plus suggestions out.
//!
//! This is the document-driven strategy: only analytes actually detected in
//! the document appear in the output. The catalog-driven alternative with
//! the opposite completeness guarantee lives in [`legacy`].

pub mod legacy;
pub mod patient;
pub mod suggest;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::matcher::normalize_name;
use crate::catalog::range::first_number;
use crate::catalog::{ReferenceCatalog, Status};
use crate::extract::TextBlock;

pub use patient::PatientInfo;

/// One detected analyte, classified when the catalog allows it.
///
/// Created once, never mutated; heuristic misses are unset fields, never
/// errors, and a result whose range could not be determined carries no
/// status rather than a fabricated "normal".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    /// Canonical name when the catalog matched, the raw document text
    /// otherwise.
    pub test_name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub reference: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedReport {
    pub patient: PatientInfo,
    pub results: Vec<LabResult>,
    pub suggestions: Vec<String>,
}

/// Document-driven parser over a shared, read-only catalog.
pub struct StructuredParser {
    catalog: Arc<ReferenceCatalog>,
}

impl StructuredParser {
    pub fn new(catalog: Arc<ReferenceCatalog>) -> Self {
        Self { catalog }
    }

    pub fn parse(&self, blocks: &[TextBlock], gender: Option<&str>) -> ParsedReport {
        let patient = patient::extract_patient(blocks);
        // The explicit gender hint from the caller outranks the header line.
        let gender = gender.or(patient.gender.as_deref());

        let mut results = Vec::new();
        let mut suggestions = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for block in blocks {
            let text = block.text.trim();
            if text.is_empty() {
                continue;
            }
            let folded = normalize_name(text);
            // The patient-name header is not an analyte line.
            if folded.starts_with("paciente") {
                continue;
            }

            let Some((raw_name, value, unit)) = split_candidate(text) else {
                continue;
            };
            if !seen.insert(normalize_name(&raw_name)) {
                continue;
            }

            let entry = self.catalog.best_match(&raw_name);
            let (test_name, reference, status) = match entry {
                Some(entry) => {
                    let resolved = self.catalog.resolve_range(entry, gender);
                    let status = match (&resolved, value) {
                        (Some((_, bounds)), Some(v)) => bounds.classify(v),
                        _ => None,
                    };
                    (entry.name.clone(), resolved.map(|(text, _)| text), status)
                }
                None => (raw_name.clone(), None, None),
            };

            // Canonical names dedupe too: "Glicose: 90" then "Glicemia: 95"
            // is one analyte, first occurrence wins.
            if !seen.insert(normalize_name(&test_name)) && normalize_name(&test_name) != normalize_name(&raw_name) {
                continue;
            }

            if let (Some(entry), Some(status)) = (entry, status) {
                if let Some(meds) = self.catalog.medications_for(entry, status) {
                    if let Some(s) = suggest::suggestion_for(&entry.name, status, meds) {
                        suggestions.push(s);
                    }
                }
            }

            results.push(LabResult {
                test_name,
                value,
                unit,
                reference,
                status,
            });
        }

        debug!(
            blocks = blocks.len(),
            results = results.len(),
            suggestions = suggestions.len(),
            "Structured parse complete"
        );

        ParsedReport {
            patient,
            results,
            suggestions,
        }
    }
}

/// Split one block into (candidate name, value, unit).
///
/// Colon blocks split on the first colon and read the value side; colonless
/// blocks take everything before the first numeric token as the name.
/// Returns `None` for blocks that cannot be an analyte line.
fn split_candidate(text: &str) -> Option<(String, Option<f64>, Option<String>)> {
    if let Some((name, value_part)) = text.split_once(':') {
        let name = name.trim();
        let value_part = value_part.trim();
        if name.is_empty() || value_part.is_empty() {
            return None;
        }
        let (value, span) = first_number(value_part)?;
        let unit = unit_after(value_part, span.end);
        return Some((name.to_string(), Some(value), unit));
    }

    let (value, span) = first_number(text)?;
    let name = text[..span.start].trim();
    if name.is_empty() {
        return None;
    }
    if normalize_name(name).starts_with("pagina") {
        return None;
    }
    let unit = unit_after(text, span.end);
    Some((name.to_string(), Some(value), unit))
}

/// Unit token immediately after the numeric value, when one follows.
fn unit_after(text: &str, from: usize) -> Option<String> {
    let token = text[from..].split_whitespace().next()?;
    let looks_like_unit = token
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '/' | '%' | 'µ' | '²' | '³' | '.'))
        && token.chars().any(|c| c.is_alphabetic() || c == '%');
    if looks_like_unit {
        Some(token.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReferenceCatalog;

    fn catalog() -> Arc<ReferenceCatalog> {
        Arc::new(
            ReferenceCatalog::from_json_str(
                r#"{
                    "Glicose": {
                        "synonyms": ["glicemia"],
                        "ideal": "70-99",
                        "medications": {"high": ["reduzir carboidratos"]}
                    },
                    "Hemoglobina": {"ideal": {"M": "13-17", "F": "12-16"}},
                    "Creatinina": {"ideal": "0,7-1,3"},
                    "Vitamina D": {"ideal": "insuficiente"}
                }"#,
            )
            .unwrap(),
        )
    }

    fn blocks(lines: &[&str]) -> Vec<TextBlock> {
        lines
            .iter()
            .map(|l| TextBlock {
                text: l.to_string(),
                page_number: 1,
                bounding_box: None,
            })
            .collect()
    }

    #[test]
    fn end_to_end_synonym_high_with_suggestion() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Glicemia: 140 mg/dL"]), None);

        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert_eq!(r.test_name, "Glicose");
        assert_eq!(r.value, Some(140.0));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.reference.as_deref(), Some("70-99"));
        assert_eq!(r.status, Some(Status::High));

        assert_eq!(report.suggestions.len(), 1);
        assert!(report.suggestions[0].contains("Glicose"));
        assert!(report.suggestions[0].contains("reduzir carboidratos"));
    }

    #[test]
    fn duplicate_analyte_first_occurrence_wins() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Glicose: 90 mg/dL", "GLICOSE: 95"]), None);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].value, Some(90.0));
        assert_eq!(report.results[0].status, Some(Status::Normal));
    }

    #[test]
    fn synonym_duplicate_of_canonical_suppressed() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Glicose: 90", "Glicemia: 140"]), None);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].value, Some(90.0));
    }

    #[test]
    fn colonless_block_parses_name_before_number() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Creatinina 1,1 mg/dL"]), None);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].test_name, "Creatinina");
        assert_eq!(report.results[0].value, Some(1.1));
        assert_eq!(report.results[0].status, Some(Status::Normal));
    }

    #[test]
    fn page_artifact_skipped() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Página 2", "página 3 de 4"]), None);
        assert!(report.results.is_empty());
    }

    #[test]
    fn block_without_number_skipped() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Resultado: aguardando"]), None);
        assert!(report.results.is_empty());
    }

    #[test]
    fn unmatched_analyte_recorded_without_status() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Ferritina: 250 ng/mL"]), None);

        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert_eq!(r.test_name, "Ferritina");
        assert_eq!(r.value, Some(250.0));
        assert!(r.reference.is_none());
        assert!(r.status.is_none());
    }

    #[test]
    fn unparseable_reference_leaves_status_unset() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Vitamina D: 12"]), None);

        let r = &report.results[0];
        assert_eq!(r.reference.as_deref(), Some("insuficiente"));
        assert!(r.status.is_none(), "must not default to normal");
    }

    #[test]
    fn gender_hint_resolves_gendered_ideal() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Hemoglobina: 12,5"]), Some("M"));
        assert_eq!(report.results[0].status, Some(Status::Low));

        let report = parser.parse(&blocks(&["Hemoglobina: 12,5"]), Some("F"));
        assert_eq!(report.results[0].status, Some(Status::Normal));
    }

    #[test]
    fn header_gender_used_when_no_hint() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(
            &blocks(&["Sexo: M", "Hemoglobina: 12,5"]),
            None,
        );
        assert_eq!(report.results[0].status, Some(Status::Low));
    }

    #[test]
    fn gendered_ideal_without_gender_is_unset() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Hemoglobina: 12,5"]), None);
        assert!(report.results[0].reference.is_none());
        assert!(report.results[0].status.is_none());
    }

    #[test]
    fn patient_name_line_not_a_result() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(
            &blocks(&["Paciente: Maria Silva 42 anos", "Glicose: 90"]),
            None,
        );
        assert_eq!(report.patient.name.as_deref(), Some("Maria Silva 42 anos"));
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].test_name, "Glicose");
    }

    #[test]
    fn normal_result_yields_no_suggestion() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Glicose: 85"]), None);
        assert_eq!(report.results[0].status, Some(Status::Normal));
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn out_of_range_without_medications_is_silent() {
        let parser = StructuredParser::new(catalog());
        let report = parser.parse(&blocks(&["Creatinina: 2,4"]), None);
        assert_eq!(report.results[0].status, Some(Status::High));
        assert!(report.suggestions.is_empty());
    }
}
