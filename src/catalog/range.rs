//! Free-text reference-range parsing and value classification.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classification of a measured value against its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Low,
    High,
    Normal,
    /// A value was measured but its reference range could not be interpreted.
    Indefinido,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Low => "low",
            Status::High => "high",
            Status::Normal => "normal",
            Status::Indefinido => "indefinido",
        };
        f.write_str(s)
    }
}

/// Parsed `(min, max)` bounds of a range descriptor.
///
/// Open bounds are stored as `±INFINITY`; a descriptor that cannot be
/// interpreted yields `(None, None)`. Parsing never fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+(?:[.,]\d+)?").unwrap())
}

fn interval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unsigned operands: lab intervals are non-negative, and allowing a sign
    // here would swallow the separator of "4,5-11,0".
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*[-\u{2013}]\s*(\d+(?:[.,]\d+)?)").unwrap()
    })
}

/// Parse a decimal token that may use a comma as the decimal separator.
pub fn parse_decimal(token: &str) -> Option<f64> {
    token.trim().replace(',', ".").parse::<f64>().ok()
}

/// First numeric token of a text, with its byte span.
pub fn first_number(text: &str) -> Option<(f64, std::ops::Range<usize>)> {
    let m = number_re().find(text)?;
    parse_decimal(m.as_str()).map(|v| (v, m.range()))
}

impl RangeBounds {
    pub const UNPARSEABLE: RangeBounds = RangeBounds { min: None, max: None };

    /// Interpret a free-text range descriptor.
    ///
    /// Recognized, in priority order: `>= N` / `≥ N` / `> N`, `<= N` / `≤ N` /
    /// `< N`, `N - M` (hyphen or en-dash, comma decimals accepted), and a bare
    /// number. A bare number becomes both bounds, so ANY deviation from a
    /// single-number ideal classifies as out of range — reference authors who
    /// write `"5"` get an exact target, not a tolerance. Only the first line
    /// of a multi-line descriptor is considered.
    pub fn parse(text: &str) -> RangeBounds {
        let line = text.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return RangeBounds::UNPARSEABLE;
        }

        if let Some(rest) = strip_any(line, &["≥", ">=", ">"]) {
            return match first_number(rest) {
                Some((n, _)) => RangeBounds { min: Some(n), max: Some(f64::INFINITY) },
                None => RangeBounds::UNPARSEABLE,
            };
        }

        if let Some(rest) = strip_any(line, &["≤", "<=", "<"]) {
            return match first_number(rest) {
                Some((n, _)) => RangeBounds { min: Some(f64::NEG_INFINITY), max: Some(n) },
                None => RangeBounds::UNPARSEABLE,
            };
        }

        if let Some(caps) = interval_re().captures(line) {
            let lo = parse_decimal(&caps[1]);
            let hi = parse_decimal(&caps[2]);
            if let (Some(lo), Some(hi)) = (lo, hi) {
                return RangeBounds { min: Some(lo), max: Some(hi) };
            }
        }

        match first_number(line) {
            Some((n, _)) => RangeBounds { min: Some(n), max: Some(n) },
            None => RangeBounds::UNPARSEABLE,
        }
    }

    pub fn is_parseable(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Classify a value against these bounds.
    ///
    /// Returns `None` when either bound is missing — an uninterpretable range
    /// never defaults to `normal`.
    pub fn classify(&self, value: f64) -> Option<Status> {
        let (min, max) = (self.min?, self.max?);
        Some(if value < min {
            Status::Low
        } else if value > max {
            Status::High
        } else {
            Status::Normal
        })
    }
}

fn strip_any<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    for p in prefixes {
        if let Some(rest) = line.strip_prefix(p) {
            return Some(rest);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_with_comma_decimals() {
        let b = RangeBounds::parse("4,5-11,0");
        assert_eq!(b.min, Some(4.5));
        assert_eq!(b.max, Some(11.0));
    }

    #[test]
    fn interval_with_en_dash() {
        let b = RangeBounds::parse("70 – 99");
        assert_eq!(b.min, Some(70.0));
        assert_eq!(b.max, Some(99.0));
    }

    #[test]
    fn greater_equal_is_open_above() {
        let b = RangeBounds::parse("≥ 10");
        assert_eq!(b.min, Some(10.0));
        assert_eq!(b.max, Some(f64::INFINITY));
    }

    #[test]
    fn ascii_greater_equal() {
        let b = RangeBounds::parse(">= 60");
        assert_eq!(b.min, Some(60.0));
        assert_eq!(b.max, Some(f64::INFINITY));
    }

    #[test]
    fn less_than_is_open_below() {
        let b = RangeBounds::parse("< 5");
        assert_eq!(b.min, Some(f64::NEG_INFINITY));
        assert_eq!(b.max, Some(5.0));
    }

    #[test]
    fn bare_number_is_both_bounds() {
        let b = RangeBounds::parse("7");
        assert_eq!(b.min, Some(7.0));
        assert_eq!(b.max, Some(7.0));
    }

    #[test]
    fn unparseable_yields_none_none() {
        let b = RangeBounds::parse("n/a");
        assert_eq!(b, RangeBounds::UNPARSEABLE);
        assert!(!b.is_parseable());
    }

    #[test]
    fn only_first_line_considered() {
        let b = RangeBounds::parse("70-99\n(fasting)");
        assert_eq!(b.min, Some(70.0));
        assert_eq!(b.max, Some(99.0));

        let b = RangeBounds::parse("ideal:\n70-99");
        assert!(!b.is_parseable());
    }

    #[test]
    fn classify_against_interval() {
        let b = RangeBounds::parse("70-99");
        assert_eq!(b.classify(65.0), Some(Status::Low));
        assert_eq!(b.classify(140.0), Some(Status::High));
        assert_eq!(b.classify(85.0), Some(Status::Normal));
        assert_eq!(b.classify(70.0), Some(Status::Normal));
        assert_eq!(b.classify(99.0), Some(Status::Normal));
    }

    #[test]
    fn classify_open_bounds() {
        assert_eq!(RangeBounds::parse("≥ 10").classify(9.9), Some(Status::Low));
        assert_eq!(RangeBounds::parse("≥ 10").classify(400.0), Some(Status::Normal));
        assert_eq!(RangeBounds::parse("< 5").classify(5.1), Some(Status::High));
        assert_eq!(RangeBounds::parse("< 5").classify(-2.0), Some(Status::Normal));
    }

    #[test]
    fn classify_bare_number_flags_any_deviation() {
        let b = RangeBounds::parse("5");
        assert_eq!(b.classify(4.9), Some(Status::Low));
        assert_eq!(b.classify(5.1), Some(Status::High));
        assert_eq!(b.classify(5.0), Some(Status::Normal));
    }

    #[test]
    fn classify_unparseable_never_normal() {
        assert_eq!(RangeBounds::UNPARSEABLE.classify(5.0), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Low).unwrap(), "\"low\"");
        assert_eq!(
            serde_json::to_string(&Status::Indefinido).unwrap(),
            "\"indefinido\""
        );
    }
}
