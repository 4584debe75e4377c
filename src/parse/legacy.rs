//! Catalog-driven line scanner.
//!
//! The inverse of the structured parser: every catalog analyte gets an output
//! entry whether or not the document mentions it, so downstream consumers can
//! distinguish "measured and normal" from "not measured at all". Matching is
//! plain normalized substring search, no fuzzy scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::matcher::normalize_name;
use crate::catalog::range::first_number;
use crate::catalog::{ReferenceCatalog, ReferenceEntry, Status};

/// Per-analyte scan outcome. All fields empty when the document never
/// mentions the analyte.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyFinding {
    pub value: Option<f64>,
    pub source_line: Option<String>,
    pub ideal_text: Option<String>,
    pub status: Option<Status>,
    pub medications: Vec<String>,
}

impl LegacyFinding {
    pub fn is_mentioned(&self) -> bool {
        self.source_line.is_some()
    }
}

/// Scan free-form lines against every catalog analyte.
///
/// The returned map has exactly one key per catalog entry, keyed by canonical
/// name. The first line mentioning an analyte (canonical name or synonym, as
/// a normalized substring) wins; a mention with a readable value but an
/// unparseable ideal range is classified [`Status::Indefinido`].
pub fn scan_lines<'a>(
    lines: impl Iterator<Item = &'a str> + Clone,
    catalog: &ReferenceCatalog,
    gender: Option<&str>,
) -> BTreeMap<String, LegacyFinding> {
    let mut findings = BTreeMap::new();

    for entry in catalog.entries() {
        let finding = scan_entry(lines.clone(), catalog, entry, gender);
        findings.insert(entry.name.clone(), finding);
    }

    let mentioned = findings.values().filter(|f| f.is_mentioned()).count();
    debug!(
        analytes = findings.len(),
        mentioned,
        "Legacy catalog scan complete"
    );
    findings
}

fn scan_entry<'a>(
    lines: impl Iterator<Item = &'a str>,
    catalog: &ReferenceCatalog,
    entry: &ReferenceEntry,
    gender: Option<&str>,
) -> LegacyFinding {
    let mut needles: Vec<String> = Vec::with_capacity(1 + entry.synonyms.len());
    needles.push(normalize_name(&entry.name));
    needles.extend(
        entry
            .synonyms
            .iter()
            .map(|s| normalize_name(s))
            .filter(|s| !s.is_empty()),
    );

    for line in lines {
        let folded = normalize_name(line);
        if !needles.iter().any(|n| folded.contains(n.as_str())) {
            continue;
        }

        let value = first_number(line).map(|(v, _)| v);
        let resolved = catalog.resolve_range(entry, gender);
        let ideal_text = resolved.as_ref().map(|(text, _)| text.clone());

        let status = match (value, &resolved) {
            (Some(v), Some((_, bounds))) => {
                // A readable value against an unreadable range is still a
                // finding, just an inconclusive one.
                Some(bounds.classify(v).unwrap_or(Status::Indefinido))
            }
            _ => None,
        };

        let medications = status
            .and_then(|s| catalog.medications_for(entry, s))
            .map(|meds| meds.names())
            .unwrap_or_default();

        return LegacyFinding {
            value,
            source_line: Some(line.trim().to_string()),
            ideal_text,
            status,
            medications,
        };
    }

    LegacyFinding::default()
}

/// Human-readable report over a raw text blob: one narrative line per
/// mentioned analyte plus a deduplicated prescription block grouped by
/// direction.
pub fn analyze_free_text(
    text: &str,
    catalog: &ReferenceCatalog,
    gender: Option<&str>,
) -> String {
    let findings = scan_lines(text.lines(), catalog, gender);

    let mut out = String::new();
    let mut considerar: Vec<String> = Vec::new();
    let mut ajustar: Vec<String> = Vec::new();

    for (name, finding) in &findings {
        if !finding.is_mentioned() {
            continue;
        }
        out.push_str(&narrative_line(name, finding));
        out.push('\n');

        let bucket = match finding.status {
            Some(Status::Low) => &mut considerar,
            Some(Status::High) => &mut ajustar,
            _ => continue,
        };
        for med in &finding.medications {
            if !bucket.iter().any(|m| m == med) {
                bucket.push(med.clone());
            }
        }
    }

    if out.is_empty() {
        out.push_str("Nenhum analito do catálogo foi encontrado no texto.\n");
    }

    if !considerar.is_empty() || !ajustar.is_empty() {
        out.push('\n');
        if !considerar.is_empty() {
            out.push_str("Considerar:\n");
            for med in &considerar {
                out.push_str("  - ");
                out.push_str(med);
                out.push('\n');
            }
        }
        if !ajustar.is_empty() {
            out.push_str("Ajustar:\n");
            for med in &ajustar {
                out.push_str("  - ");
                out.push_str(med);
                out.push('\n');
            }
        }
    }

    out
}

fn narrative_line(name: &str, finding: &LegacyFinding) -> String {
    let mut line = name.to_string();
    if let Some(v) = finding.value {
        line.push_str(&format!(": {v}"));
    }
    if let Some(ideal) = &finding.ideal_text {
        line.push_str(&format!(" (ideal {ideal})"));
    }
    if let Some(status) = finding.status {
        line.push_str(&format!(" [{status}]"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::from_json_str(
            r#"{
                "Glicose": {
                    "synonyms": ["glicemia"],
                    "ideal": "70-99",
                    "medications": {"high": ["reduzir carboidratos"]}
                },
                "Hemoglobina": {
                    "ideal": {"M": "13-17", "F": "12-16"},
                    "medications": {"low": ["Sulfato ferroso"]}
                },
                "Colesterol Total": {"ideal": "< 190"},
                "TSH": {"ideal": "0.4-4.0"},
                "Vitamina D": {"ideal": "suficiente"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn every_analyte_gets_a_key() {
        let c = catalog();
        let text = "Glicose: 90 mg/dL\nTSH 2,1";
        let findings = scan_lines(text.lines(), &c, None);

        assert_eq!(findings.len(), 5);
        assert!(findings["Glicose"].is_mentioned());
        assert!(findings["TSH"].is_mentioned());
        assert!(!findings["Hemoglobina"].is_mentioned());
        assert!(!findings["Colesterol Total"].is_mentioned());
        assert!(!findings["Vitamina D"].is_mentioned());

        let missing = &findings["Hemoglobina"];
        assert!(missing.value.is_none());
        assert!(missing.source_line.is_none());
        assert!(missing.status.is_none());
        assert!(missing.medications.is_empty());
    }

    #[test]
    fn synonym_substring_matches() {
        let c = catalog();
        let findings = scan_lines("Glicemia de jejum: 140 mg/dL".lines(), &c, None);
        let f = &findings["Glicose"];
        assert_eq!(f.value, Some(140.0));
        assert_eq!(f.status, Some(Status::High));
        assert_eq!(f.medications, vec!["reduzir carboidratos".to_string()]);
    }

    #[test]
    fn first_mentioning_line_wins() {
        let c = catalog();
        let findings = scan_lines("Glicose: 90\nGlicose: 180".lines(), &c, None);
        assert_eq!(findings["Glicose"].value, Some(90.0));
        assert_eq!(findings["Glicose"].status, Some(Status::Normal));
    }

    #[test]
    fn unparseable_ideal_with_value_is_indefinido() {
        let c = catalog();
        let findings = scan_lines("Vitamina D: 28 ng/mL".lines(), &c, None);
        let f = &findings["Vitamina D"];
        assert_eq!(f.value, Some(28.0));
        assert_eq!(f.ideal_text.as_deref(), Some("suficiente"));
        assert_eq!(f.status, Some(Status::Indefinido));
        assert!(f.medications.is_empty());
    }

    #[test]
    fn mention_without_value_has_no_status() {
        let c = catalog();
        let findings = scan_lines("Glicose: aguardando coleta".lines(), &c, None);
        let f = &findings["Glicose"];
        assert!(f.is_mentioned());
        assert!(f.value.is_none());
        assert!(f.status.is_none());
    }

    #[test]
    fn gendered_range_applies() {
        let c = catalog();
        let findings = scan_lines("Hemoglobina: 12,5 g/dL".lines(), &c, Some("M"));
        assert_eq!(findings["Hemoglobina"].status, Some(Status::Low));
        assert_eq!(
            findings["Hemoglobina"].medications,
            vec!["Sulfato ferroso".to_string()]
        );

        let findings = scan_lines("Hemoglobina: 12,5 g/dL".lines(), &c, Some("F"));
        assert_eq!(findings["Hemoglobina"].status, Some(Status::Normal));
        assert!(findings["Hemoglobina"].medications.is_empty());
    }

    #[test]
    fn free_text_report_groups_prescriptions() {
        let c = catalog();
        let report = analyze_free_text(
            "Glicemia: 140 mg/dL\nHemoglobina: 11 g/dL\nGlicose alta de novo: 150",
            &c,
            Some("F"),
        );

        assert!(report.contains("Glicose: 140"));
        assert!(report.contains("Hemoglobina: 11"));
        assert!(report.contains("Considerar:\n  - Sulfato ferroso"));
        assert!(report.contains("Ajustar:\n  - reduzir carboidratos"));
        // Duplicate mention must not duplicate the prescription.
        assert_eq!(report.matches("reduzir carboidratos").count(), 1);
    }

    #[test]
    fn free_text_report_empty_document() {
        let c = catalog();
        let report = analyze_free_text("nada relevante aqui", &c, None);
        assert!(report.contains("Nenhum analito"));
        assert!(!report.contains("Considerar:"));
        assert!(!report.contains("Ajustar:"));
    }
}
