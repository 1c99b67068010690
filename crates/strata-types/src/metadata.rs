//! CDMI metadata and its storage boxing.
//!
//! User metadata values are either a single string or a list of strings.
//! The row store only holds `text -> text` maps, so every value is boxed as
//! the JSON document `{"json": <value>}`; list values survive the round trip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single metadata value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Empty values are never stored.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(items) => Some(Self::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// User-facing metadata map.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Metadata as physically stored: every value JSON-boxed.
pub type StoredMetadata = BTreeMap<String, String>;

/// Box user metadata for storage, dropping empty values.
pub fn box_metadata(metadata: &Metadata) -> StoredMetadata {
    metadata
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), serde_json::json!({ "json": v }).to_string()))
        .collect()
}

/// Unbox stored metadata.
///
/// Values that are not boxed JSON are legacy plain strings and are returned
/// verbatim. Empty values are dropped.
pub fn unbox_metadata(stored: &StoredMetadata) -> Metadata {
    let mut out = Metadata::new();
    for (key, raw) in stored {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(mut obj)) if obj.contains_key("json") => {
                obj.remove("json").and_then(MetaValue::from_json)
            }
            _ => Some(MetaValue::Text(raw.clone())),
        };
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            out.insert(key.clone(), value);
        }
    }
    out
}

/// Flatten metadata into `(key, value)` pairs; list values produce one pair
/// per element.
pub fn metadata_to_pairs(metadata: &Metadata) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in metadata {
        match value {
            MetaValue::Text(s) => pairs.push((key.clone(), s.clone())),
            MetaValue::List(items) => {
                pairs.extend(items.iter().map(|item| (key.clone(), item.clone())))
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        let mut md = Metadata::new();
        md.insert("author".into(), "ada".into());
        md.insert(
            "tags".into(),
            MetaValue::List(vec!["x".into(), "y".into()]),
        );
        md
    }

    #[test]
    fn list_values_roundtrip() {
        let md = sample();
        let stored = box_metadata(&md);
        assert_eq!(stored["author"], r#"{"json":"ada"}"#);
        assert_eq!(unbox_metadata(&stored), md);
    }

    #[test]
    fn empty_values_are_dropped() {
        let mut md = Metadata::new();
        md.insert("blank".into(), "".into());
        md.insert("none".into(), MetaValue::List(vec![]));
        assert!(box_metadata(&md).is_empty());
    }

    #[test]
    fn legacy_plain_values_pass_through() {
        let mut stored = StoredMetadata::new();
        stored.insert("plain".into(), "hello".into());
        stored.insert("number".into(), "42".into());
        stored.insert("empty".into(), "".into());
        let md = unbox_metadata(&stored);
        assert_eq!(md["plain"], MetaValue::Text("hello".into()));
        assert_eq!(md["number"], MetaValue::Text("42".into()));
        assert!(!md.contains_key("empty"));
    }

    #[test]
    fn pairs_expand_lists() {
        let pairs = metadata_to_pairs(&sample());
        assert_eq!(
            pairs,
            vec![
                ("author".to_string(), "ada".to_string()),
                ("tags".to_string(), "x".to_string()),
                ("tags".to_string(), "y".to_string()),
            ]
        );
    }
}
