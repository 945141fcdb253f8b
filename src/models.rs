//! Data models shared by the extraction passes, the merger and the mapper.
//!
//! - [`ScrapeTarget`]: a validated page URL
//! - [`FieldValue`] / [`FieldMap`]: the flat, loosely-typed content a pass emits
//! - [`RawRecord`]: one pass's result for one URL, either content or a classified error
//! - [`MergedRecord`]: the field-wise union of every pass for one URL
//! - [`CanonicalRecord`]: the nested output document persisted downstream

use crate::errors::ScrapeError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A page URL to scrape. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScrapeTarget(String);

impl ScrapeTarget {
    /// Trim the input; blank strings are not targets.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse and deduplicate a URL list, keeping first-seen order.
    pub fn dedupe<S: AsRef<str>>(urls: &[S]) -> Vec<ScrapeTarget> {
        urls.iter()
            .filter_map(|u| ScrapeTarget::parse(u.as_ref()))
            .unique()
            .collect()
    }
}

impl AsRef<str> for ScrapeTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which extractor produced a record. Merge order follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTag {
    Meta,
    VisibleText,
}

impl fmt::Display for PassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassTag::Meta => f.write_str("meta"),
            PassTag::VisibleText => f.write_str("visible_text"),
        }
    }
}

/// A single raw field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Whether the value counts as present for alias resolution.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Integer(n) => *n != 0,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::List(items) => !items.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Integer(n) => Value::from(*n),
            FieldValue::Text(s) => Value::from(s.as_str()),
            FieldValue::List(items) => Value::from(items.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(FieldValue::Null, FieldValue::Text)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

/// Content fields keyed by raw field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A classified per-URL failure from one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassError {
    pub pass: PassTag,
    pub kind: String,
    pub message: String,
}

impl PassError {
    pub fn from_scrape_error(pass: PassTag, e: &ScrapeError) -> Self {
        Self {
            pass,
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Content(FieldMap),
    Failed(PassError),
}

/// One pass's result for one URL. Built once, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source_url: String,
    pub platform: String,
    pub pass: PassTag,
    pub scraped_at: i64,
    pub outcome: Outcome,
}

impl RawRecord {
    pub fn content(
        target: &ScrapeTarget,
        platform: &str,
        pass: PassTag,
        fields: FieldMap,
    ) -> Self {
        Self {
            source_url: target.to_string(),
            platform: platform.to_string(),
            pass,
            scraped_at: chrono::Utc::now().timestamp(),
            outcome: Outcome::Content(fields),
        }
    }

    pub fn failed(target: &ScrapeTarget, platform: &str, pass: PassTag, e: &ScrapeError) -> Self {
        Self {
            source_url: target.to_string(),
            platform: platform.to_string(),
            pass,
            scraped_at: chrono::Utc::now().timestamp(),
            outcome: Outcome::Failed(PassError::from_scrape_error(pass, e)),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// All passes for one URL folded together.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub source_url: String,
    pub fields: FieldMap,
    pub errors: Vec<PassError>,
    pub scraped_at: Option<i64>,
    /// At least one pass produced content.
    pub has_content: bool,
}

impl MergedRecord {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            fields: FieldMap::new(),
            errors: Vec::new(),
            scraped_at: None,
            has_content: false,
        }
    }

    /// Look up a raw field, including the typed `source_url` and `scraped_at`.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        match name {
            "source_url" => Some(FieldValue::Text(self.source_url.clone())),
            "scraped_at" => self.scraped_at.map(FieldValue::Integer),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// A document shaped like the canonical schema template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord(pub Value);

impl CanonicalRecord {
    /// Read a value by dotted path, e.g. `profile.full_name`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.0, |node, key| node.get(key))
    }

    /// Mutable access by dotted path.
    #[cfg(test)]
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        path.split('.').try_fold(&mut self.0, |node, key| node.get_mut(key))
    }

    pub fn is_error(&self) -> bool {
        self.0.get("error").is_some_and(|e| !e.is_null())
    }

    pub fn url(&self) -> Option<&str> {
        self.0.get("url").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let urls = [
            "https://www.quora.com/b",
            " https://www.quora.com/a ",
            "",
            "https://www.quora.com/b",
            "https://www.quora.com/a",
        ];
        let targets = ScrapeTarget::dedupe(&urls);
        let as_str: Vec<&str> = targets.iter().map(ScrapeTarget::as_str).collect();
        assert_eq!(as_str, vec!["https://www.quora.com/b", "https://www.quora.com/a"]);
    }

    #[test]
    fn test_blank_target_rejected() {
        assert!(ScrapeTarget::parse("   ").is_none());
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::Null.is_truthy());
        assert!(!FieldValue::Integer(0).is_truthy());
        assert!(!FieldValue::Text(String::new()).is_truthy());
        assert!(!FieldValue::List(vec![]).is_truthy());
        assert!(FieldValue::Integer(12).is_truthy());
        assert!(FieldValue::from("Adam").is_truthy());
        assert!(FieldValue::List(vec!["a".into()]).is_truthy());
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), "A".into());
        fields.insert("emails".into(), FieldValue::List(vec![]));
        fields.insert("followers".into(), 42.into());
        fields.insert("description".into(), FieldValue::Null);
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            value,
            json!({"title": "A", "emails": [], "followers": 42, "description": null})
        );
    }

    #[test]
    fn test_pass_error_display() {
        let e = ScrapeError::Extraction("main content never appeared".into());
        let pe = PassError::from_scrape_error(PassTag::VisibleText, &e);
        assert_eq!(pe.to_string(), "ExtractionFailure: main content never appeared");
    }

    #[test]
    fn test_merged_get_exposes_typed_fields() {
        let mut merged = MergedRecord::new("https://www.quora.com/profile/X");
        merged.scraped_at = Some(1_700_000_000);
        assert_eq!(
            merged.get("source_url"),
            Some(FieldValue::from("https://www.quora.com/profile/X"))
        );
        assert_eq!(merged.get("scraped_at"), Some(FieldValue::Integer(1_700_000_000)));
        assert_eq!(merged.get("title"), None);
    }

    #[test]
    fn test_canonical_path_access() {
        let mut record = CanonicalRecord(json!({"profile": {"full_name": "Ada"}, "url": "u"}));
        assert_eq!(record.get("profile.full_name"), Some(&json!("Ada")));
        assert_eq!(record.get("profile.missing"), None);
        *record.get_mut("profile.full_name").unwrap() = json!("Grace");
        assert_eq!(record.get("profile.full_name"), Some(&json!("Grace")));
        assert_eq!(record.url(), Some("u"));
        assert!(!record.is_error());
    }
}
