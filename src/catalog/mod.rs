//! Reference catalog: loads the analyte reference table and answers fuzzy
//! name lookups, gender-aware ideal-range resolution and medication queries.
//!
//! One catalog instance is immutable after load and shared read-only across
//! all parsing operations (see [`cache::CatalogCache`]).

pub mod cache;
pub mod entry;
pub mod matcher;
pub mod range;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub use cache::CatalogCache;
pub use entry::{IdealRange, MedicationItem, MedicationPayload, MedicationRecord, ReferenceEntry};
pub use range::{RangeBounds, Status};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("reference file unreadable at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reference file is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("reference file must be a mapping of analyte name to definition")]
    NotAMapping,

    #[error("definition for '{name}' is malformed: {detail}")]
    BadDefinition { name: String, detail: String },
}

/// Loaded, indexed reference table.
#[derive(Debug)]
pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
    /// Normalized lookup keys (canonical names and synonyms) in a stable
    /// order, each pointing back to its entry.
    keys: Vec<(String, usize)>,
    exact: HashMap<String, usize>,
}

/// A gender-resolved `ideal` value, borrowed from the entry.
pub enum ResolvedIdeal<'a> {
    Text(&'a str),
    Candidates(&'a [String]),
}

impl ReferenceCatalog {
    /// Load and index a reference file.
    ///
    /// Accepts either a top-level `{analyte: definition}` object or the same
    /// mapping nested under a `"tests"` key.
    pub fn load(path: &Path) -> Result<ReferenceCatalog, ReferenceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;
        debug!(
            path = %path.display(),
            analytes = catalog.entries.len(),
            keys = catalog.keys.len(),
            "Reference catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<ReferenceCatalog, ReferenceError> {
        let root: serde_json::Value = serde_json::from_str(raw)?;
        let map = match &root {
            serde_json::Value::Object(obj) => match obj.get("tests") {
                Some(serde_json::Value::Object(inner)) => inner,
                Some(_) => return Err(ReferenceError::NotAMapping),
                None => obj,
            },
            _ => return Err(ReferenceError::NotAMapping),
        };

        // BTreeMap gives a deterministic entry order regardless of how the
        // file was authored, which keeps fuzzy tie-breaking stable.
        let mut sorted: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        for (name, def) in map {
            sorted.insert(name.clone(), def.clone());
        }

        let mut entries = Vec::with_capacity(sorted.len());
        for (name, def) in sorted {
            if !def.is_object() {
                return Err(ReferenceError::BadDefinition {
                    name,
                    detail: "definition must be an object".into(),
                });
            }
            let mut entry: ReferenceEntry =
                serde_json::from_value(def).map_err(|e| ReferenceError::BadDefinition {
                    name: name.clone(),
                    detail: e.to_string(),
                })?;
            entry.name = name;
            entries.push(entry);
        }

        let mut keys = Vec::new();
        let mut exact = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let canonical = matcher::normalize_name(&entry.name);
            exact.entry(canonical.clone()).or_insert(idx);
            keys.push((canonical, idx));
            for syn in &entry.synonyms {
                let normalized = matcher::normalize_name(syn);
                if normalized.is_empty() {
                    continue;
                }
                exact.entry(normalized.clone()).or_insert(idx);
                keys.push((normalized, idx));
            }
        }

        Ok(ReferenceCatalog { entries, keys, exact })
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best catalog entry for a raw analyte name, or `None`.
    ///
    /// Exact normalized match (canonical name or synonym) wins immediately;
    /// otherwise fuzzy matching runs under graduated cutoffs. Deterministic
    /// for a given catalog and query.
    pub fn best_match(&self, raw_name: &str) -> Option<&ReferenceEntry> {
        let query = matcher::normalize_name(raw_name);
        if query.is_empty() {
            return None;
        }
        if let Some(&idx) = self.exact.get(&query) {
            return Some(&self.entries[idx]);
        }

        let key_strings: Vec<String> = self.keys.iter().map(|(k, _)| k.clone()).collect();
        let key_idx = matcher::best_fuzzy_index(&query, &key_strings)?;
        let entry_idx = self.keys[key_idx].1;
        debug!(
            query = %query,
            matched = %self.entries[entry_idx].name,
            "Fuzzy analyte match"
        );
        Some(&self.entries[entry_idx])
    }

    /// Gender-appropriate view of an entry's ideal data.
    ///
    /// Gender-keyed ideals try the exact key first, then any key whose first
    /// letter matches the gender code (`M`/`m`/`Masculino`-style). Ideals
    /// that are not gender-keyed are returned directly.
    pub fn ideal_for_gender<'a>(
        &self,
        entry: &'a ReferenceEntry,
        gender: Option<&str>,
    ) -> Option<ResolvedIdeal<'a>> {
        match entry.ideal.as_ref()? {
            IdealRange::Single(s) => Some(ResolvedIdeal::Text(s)),
            IdealRange::Candidates(list) => Some(ResolvedIdeal::Candidates(list)),
            IdealRange::ByGender(map) => {
                let gender = gender?.trim();
                if gender.is_empty() {
                    return None;
                }
                if let Some(v) = map.get(gender) {
                    return Some(ResolvedIdeal::Text(v));
                }
                let code = gender_letter(gender)?;
                map.iter()
                    .find(|(k, _)| gender_letter(k) == Some(code))
                    .map(|(_, v)| ResolvedIdeal::Text(v))
            }
        }
    }

    /// Ideal-range text plus parsed bounds for an entry, honoring gender.
    ///
    /// Candidate lists are tried in order until one parses; when none does,
    /// the first candidate is kept as display text with unparseable bounds.
    pub fn resolve_range(
        &self,
        entry: &ReferenceEntry,
        gender: Option<&str>,
    ) -> Option<(String, RangeBounds)> {
        match self.ideal_for_gender(entry, gender)? {
            ResolvedIdeal::Text(s) => Some((s.to_string(), RangeBounds::parse(s))),
            ResolvedIdeal::Candidates(list) => {
                for candidate in list {
                    let bounds = RangeBounds::parse(candidate);
                    if bounds.is_parseable() {
                        return Some((candidate.clone(), bounds));
                    }
                }
                list.first()
                    .map(|c| (c.clone(), RangeBounds::UNPARSEABLE))
            }
        }
    }

    /// Medications registered for a low/high status, absent otherwise.
    pub fn medications_for<'a>(
        &self,
        entry: &'a ReferenceEntry,
        status: Status,
    ) -> Option<&'a MedicationPayload> {
        let key = match status {
            Status::Low => "low",
            Status::High => "high",
            _ => return None,
        };
        entry.medications.get(key)
    }
}

/// Single-letter gender code: first alphabetic char, uppercased, diacritics
/// ignored. "Masculino" and "m" both map to 'M'.
fn gender_letter(s: &str) -> Option<char> {
    matcher::normalize_name(s)
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.to_ascii_uppercase())
}
