//! Header-line patient metadata heuristics.
//!
//! Lab reports front-load "Label: Value" lines; the first line matching each
//! keyword wins and absence just leaves the field unset. No validation beyond
//! presence — a garbled CPF is still recorded as seen.

use serde::{Deserialize, Serialize};

use crate::catalog::matcher::normalize_name;
use crate::extract::TextBlock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub doctor: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
}

impl PatientInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.doctor.is_none()
            && self.gender.is_none()
            && self.birth_date.is_none()
            && self.phone.is_none()
            && self.cpf.is_none()
    }
}

pub fn extract_patient(blocks: &[TextBlock]) -> PatientInfo {
    extract_patient_lines(blocks.iter().map(|b| b.text.as_str()))
}

pub fn extract_patient_lines<'a>(lines: impl Iterator<Item = &'a str>) -> PatientInfo {
    let mut patient = PatientInfo::default();

    for line in lines {
        let folded = normalize_name(line);

        if patient.name.is_none() && folded.starts_with("paciente") {
            patient.name = value_after_keyword(line, "paciente");
        }
        if patient.doctor.is_none()
            && (folded.contains("medico") || folded.contains("solicitante"))
        {
            patient.doctor = value_after_colon(line);
        }
        if patient.gender.is_none() && folded.contains("sexo") {
            patient.gender = value_after_colon(line);
        }
        if patient.birth_date.is_none() && folded.contains("nascimento") {
            patient.birth_date = value_after_colon(line);
        }
        if patient.phone.is_none() && folded.contains("telefone") {
            patient.phone = value_after_colon(line);
        }
        if patient.cpf.is_none() && folded.contains("cpf") {
            patient.cpf = value_after_colon(line);
        }
    }

    patient
}

/// Text after a case/diacritic-insensitive keyword prefix, with a separating
/// colon stripped when present.
fn value_after_keyword(line: &str, keyword: &str) -> Option<String> {
    // The keyword match ran on the folded line; find the cut point on the raw
    // line by char count (folding preserves char positions for these keywords).
    let rest: String = line.trim_start().chars().skip(keyword.chars().count()).collect();
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn value_after_colon(line: &str) -> Option<String> {
    let (_, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn full_header_extracted() {
        let p = extract_patient(&blocks(&[
            "Paciente: Maria da Silva",
            "Médico Solicitante: Dr. João Costa",
            "Sexo: F",
            "Data de Nascimento: 02/03/1985",
            "Telefone: (11) 99999-0000",
            "CPF: 123.456.789-00",
        ]));
        assert_eq!(p.name.as_deref(), Some("Maria da Silva"));
        assert_eq!(p.doctor.as_deref(), Some("Dr. João Costa"));
        assert_eq!(p.gender.as_deref(), Some("F"));
        assert_eq!(p.birth_date.as_deref(), Some("02/03/1985"));
        assert_eq!(p.phone.as_deref(), Some("(11) 99999-0000"));
        assert_eq!(p.cpf.as_deref(), Some("123.456.789-00"));
    }

    #[test]
    fn name_without_colon() {
        let p = extract_patient(&blocks(&["PACIENTE Maria da Silva"]));
        assert_eq!(p.name.as_deref(), Some("Maria da Silva"));
    }

    #[test]
    fn first_matching_line_wins() {
        let p = extract_patient(&blocks(&[
            "Paciente: Primeira Pessoa",
            "Paciente: Segunda Pessoa",
        ]));
        assert_eq!(p.name.as_deref(), Some("Primeira Pessoa"));
    }

    #[test]
    fn missing_fields_stay_unset() {
        let p = extract_patient(&blocks(&["Glicose: 90 mg/dL"]));
        assert!(p.is_empty());
    }

    #[test]
    fn medico_matched_without_diacritics() {
        let p = extract_patient(&blocks(&["Medico: Dra. Ana"]));
        assert_eq!(p.doctor.as_deref(), Some("Dra. Ana"));
    }

    #[test]
    fn empty_value_after_colon_is_unset() {
        let p = extract_patient(&blocks(&["Sexo:  "]));
        assert!(p.gender.is_none());
    }
}
