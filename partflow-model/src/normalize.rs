//! Canonical form for incoming parts.
//!
//! Two fields are rewritten, everything else is left alone:
//! - `amount`: a positive integer, `1` when the raw value is unusable
//! - the display identifier (`partId` by default): first non-empty value of
//!   the configured fallback sources (`partId`, `name`, `id`)

use crate::Entity;
use serde_json::Value;

pub(crate) const DEFAULT_DISPLAY_FIELD: &str = "partId";
pub(crate) const DEFAULT_DISPLAY_SOURCES: [&str; 3] = ["partId", "name", "id"];

/// Normalize with the default field names.
#[must_use]
pub fn normalize(entity: Entity) -> Entity {
    Normalizer::default().normalize(entity)
}

/// Parse a raw `amount` the way the web client does: the leading integer of
/// a number or string, if it is greater than zero. Anything else is `1`.
#[must_use]
pub fn parse_amount(raw: Option<&Value>) -> u64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(truncate_float)),
        Some(Value::String(s)) => leading_integer(s),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 => n,
        _ => 1,
    }
}

fn truncate_float(f: f64) -> u64 {
    if f.is_finite() && f >= 1.0 {
        // `as` saturates at u64::MAX.
        f.trunc() as u64
    } else {
        0
    }
}

/// Leading `[+-]?[0-9]+` after optional whitespace. Negative values map to 0.
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return None;
    }
    if negative {
        return Some(0);
    }
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

/// Rewrites `amount` and the display identifier of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    display_field: String,
    display_sources: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            display_field: DEFAULT_DISPLAY_FIELD.to_string(),
            display_sources: DEFAULT_DISPLAY_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(display_field: impl Into<String>, display_sources: Vec<String>) -> Self {
        Self {
            display_field: display_field.into(),
            display_sources,
        }
    }

    #[must_use]
    pub fn display_field(&self) -> &str {
        &self.display_field
    }

    #[must_use]
    pub fn normalize(&self, mut entity: Entity) -> Entity {
        let amount = parse_amount(entity.get("amount"));
        let display = self.display_identifier(&entity);
        entity.insert("amount", amount);
        entity.insert(&self.display_field, display);
        entity
    }

    /// First non-empty source, rendered as a string; `""` if none.
    #[must_use]
    pub fn display_identifier(&self, entity: &Entity) -> String {
        self.display_sources
            .iter()
            .find_map(|source| match entity.get(source) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leading_integer_cases() {
        assert_eq!(leading_integer("42"), Some(42));
        assert_eq!(leading_integer("  7 pcs"), Some(7));
        assert_eq!(leading_integer("3.9"), Some(3));
        assert_eq!(leading_integer("+5"), Some(5));
        assert_eq!(leading_integer("-5"), Some(0));
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("99999999999999999999999"), Some(u64::MAX));
    }

    #[test]
    fn truncate_float_cases() {
        assert_eq!(truncate_float(2.7), 2);
        assert_eq!(truncate_float(0.5), 0);
        assert_eq!(truncate_float(f64::NAN), 0);
        assert_eq!(truncate_float(-3.0), 0);
    }

    #[test]
    fn negative_number_amount_is_one() {
        assert_eq!(parse_amount(Some(&json!(-4))), 1);
    }
}
