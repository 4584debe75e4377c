use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One analyte definition from the reference table.
///
/// `name` is the canonical analyte name (the JSON key); everything else comes
/// from the definition object. Entries are immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Filled from the JSON key by the catalog loader, not the definition
    /// object itself.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub ideal: Option<IdealRange>,
    #[serde(default)]
    pub medications: BTreeMap<String, MedicationPayload>,
}

/// The `ideal` field as different reference-file authors write it:
/// a single range descriptor, a gender-keyed map, or a list of candidate
/// descriptors to try in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdealRange {
    Single(String),
    Candidates(Vec<String>),
    ByGender(BTreeMap<String, String>),
}

/// Medication data registered for a status ("low"/"high").
///
/// Reference files are authored by different people: some write a plain
/// string, some a list of names, some a list of structured records. The
/// variants make the formatting logic explicit instead of inspecting shapes
/// at use sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MedicationPayload {
    Text(String),
    Structured(Vec<MedicationItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MedicationItem {
    Name(String),
    Record(MedicationRecord),
}

/// Structured medication record as found in the reference file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRecord {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "preparo", default)]
    pub preparation: Option<String>,
    #[serde(rename = "aplicacao", default)]
    pub application: Option<String>,
}

impl MedicationPayload {
    /// Medication names joined with commas, regardless of authoring shape.
    pub fn joined_names(&self) -> String {
        match self {
            MedicationPayload::Text(s) => s.trim().to_string(),
            MedicationPayload::Structured(items) => items
                .iter()
                .map(|item| match item {
                    MedicationItem::Name(n) => n.trim(),
                    MedicationItem::Record(r) => r.name.trim(),
                })
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Individual medication names (for grouped prescription output).
    pub fn names(&self) -> Vec<String> {
        match self {
            MedicationPayload::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    vec![]
                } else {
                    vec![t.to_string()]
                }
            }
            MedicationPayload::Structured(items) => items
                .iter()
                .map(|item| match item {
                    MedicationItem::Name(n) => n.trim().to_string(),
                    MedicationItem::Record(r) => r.name.trim().to_string(),
                })
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}
