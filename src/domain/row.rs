//! Legacy source rows
//!
//! A [`SourceRow`] is one record of a stage as returned by a source adapter:
//! a monotonic integer key used as the resumable cursor, the legacy id used
//! for identity mapping, and the raw column values as a JSON object.

use crate::domain::errors::SourceError;
use crate::domain::ids::LegacyId;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One legacy record of a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    /// Monotonic key the stage is ordered by
    pub key: i64,
    /// Identity of the record in the legacy dataset
    pub legacy_id: LegacyId,
    /// Column values
    pub fields: Map<String, Value>,
}

impl SourceRow {
    /// Builds a row whose legacy id is the decimal form of its key
    pub fn new(key: i64, fields: Value) -> Result<Self, SourceError> {
        Self::with_legacy_id(key, LegacyId::from(key), fields)
    }

    /// Builds a row with an explicit legacy id
    pub fn with_legacy_id(key: i64, legacy_id: LegacyId, fields: Value) -> Result<Self, SourceError> {
        match fields {
            Value::Object(fields) => Ok(Self {
                key,
                legacy_id,
                fields,
            }),
            other => Err(SourceError::InvalidRow(format!(
                "row {key} is not a JSON object: {other}"
            ))),
        }
    }

    /// Raw value of a column
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Non-blank string column
    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// String column, accepting numbers and booleans as their text form
    pub fn string(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Free text column, kept verbatim (may be empty)
    pub fn text(&self, field: &str) -> String {
        self.get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Integer column, accepting numeric strings
    pub fn i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean column, accepting 0/1 and "true"/"false"
    pub fn bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reference to another legacy entity
    ///
    /// Null, blank, zero and negative values mean "no reference"; legacy
    /// schemas commonly use 0 for a missing parent.
    pub fn legacy_ref(&self, field: &str) -> Option<LegacyId> {
        parse_legacy_ref(self.get(field)?)
    }

    /// List of references, from a JSON array or a comma separated string
    pub fn legacy_refs(&self, field: &str) -> Vec<LegacyId> {
        match self.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(parse_legacy_ref).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .filter_map(|part| parse_legacy_ref(&Value::String(part.to_string())))
                .collect(),
            Some(other) => parse_legacy_ref(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// List of strings, from a JSON array or a comma separated string
    pub fn string_list(&self, field: &str) -> Vec<String> {
        let items: Vec<String> = match self.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Timestamp column, from unix seconds or an RFC 3339 string
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        match self.get(field)? {
            Value::Number(n) => n
                .as_i64()
                .filter(|secs| *secs > 0)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

fn parse_legacy_ref(value: &Value) -> Option<LegacyId> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(id) if id > 0 => Some(LegacyId::from(id)),
            Some(_) => None,
            None => LegacyId::new(n.to_string()).ok(),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(id) if id <= 0 => None,
                _ => LegacyId::new(trimmed).ok(),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(fields: Value) -> SourceRow {
        SourceRow::new(1, fields).unwrap()
    }

    #[test]
    fn test_rejects_non_object_fields() {
        assert!(SourceRow::new(1, json!([1, 2])).is_err());
    }

    #[test]
    fn test_legacy_ref_treats_zero_and_blank_as_absent() {
        let r = row(json!({"a": 0, "b": "", "c": -3, "d": null, "e": "17", "f": 9}));
        assert_eq!(r.legacy_ref("a"), None);
        assert_eq!(r.legacy_ref("b"), None);
        assert_eq!(r.legacy_ref("c"), None);
        assert_eq!(r.legacy_ref("d"), None);
        assert_eq!(r.legacy_ref("e"), Some(LegacyId::from(17)));
        assert_eq!(r.legacy_ref("f"), Some(LegacyId::from(9)));
        assert_eq!(r.legacy_ref("missing"), None);
    }

    #[test]
    fn test_legacy_refs_from_array_and_string() {
        let r = row(json!({"arr": [3, 0, "4"], "csv": "5, 6,,0"}));
        assert_eq!(r.legacy_refs("arr"), vec![LegacyId::from(3), LegacyId::from(4)]);
        assert_eq!(r.legacy_refs("csv"), vec![LegacyId::from(5), LegacyId::from(6)]);
    }

    #[test]
    fn test_string_list_trims_entries() {
        let r = row(json!({"tags": "rust, async ,", "list": ["a", " b "]}));
        assert_eq!(r.string_list("tags"), vec!["rust", "async"]);
        assert_eq!(r.string_list("list"), vec!["a", "b"]);
    }

    #[test]
    fn test_timestamp_parsing() {
        let r = row(json!({"unix": 1_700_000_000, "iso": "2024-01-02T03:04:05Z", "zero": 0}));
        assert_eq!(r.timestamp("unix").unwrap().timestamp(), 1_700_000_000);
        assert_eq!(r.timestamp("iso").unwrap().timestamp(), 1_704_164_645);
        assert!(r.timestamp("zero").is_none());
    }

    #[test]
    fn test_scalar_accessors() {
        let r = row(json!({"n": "42", "s": "  hi ", "blank": "  ", "flag": 1}));
        assert_eq!(r.i64("n"), Some(42));
        assert_eq!(r.str("s"), Some("hi"));
        assert_eq!(r.str("blank"), None);
        assert_eq!(r.string("n"), Some("42".to_string()));
        assert_eq!(r.bool("flag"), Some(true));
        assert_eq!(r.text("missing"), "");
    }
}
