//! Project merged records onto the canonical output document.
//!
//! Every call deep-copies the template, then fills each path in [`ALIASES`]
//! from the first raw field that is present and truthy. Paths with no match
//! keep the template default. Platform tags and `metadata.scraped_at` are
//! always stamped last.
//!
//! When a pass failed, the root `error` field carries the last failure as
//! `"<Kind>: <message>"` and `metadata.errors` lists every failure. A URL for
//! which no pass produced content is emitted in the flat error shape instead:
//!
//! ```json
//! {"platform": "quora", "source": "quora", "url": "...", "error": "NavigationTimeout: ...", "scraped_at": 1700000000}
//! ```

use crate::errors::ConfigError;
use crate::models::{CanonicalRecord, MergedRecord};
use serde_json::{json, Map, Value};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

const EMBEDDED_TEMPLATE: &str = include_str!("schema_template.json");

/// Canonical path to the raw field names tried for it, in order.
pub type AliasTable = &'static [(&'static str, &'static [&'static str])];

pub const ALIASES: AliasTable = &[
    ("url", &["source_url"]),
    ("profile.username", &["username"]),
    ("profile.full_name", &["full_name", "title", "question_title"]),
    ("profile.bio", &["bio", "description"]),
    ("profile.followers", &["followers"]),
    ("profile.following", &["following"]),
    ("profile.answers_count", &["answers_count"]),
    ("profile.questions_count", &["questions_count"]),
    ("contact.emails", &["emails"]),
    ("contact.phone_numbers", &["phones", "phone_numbers"]),
    ("contact.websites", &["external_links", "websites"]),
    ("contact.bio_links", &["quora_links", "bio_links"]),
];

#[derive(Debug, Clone)]
pub struct SchemaMapper {
    template: Value,
    platform: String,
    aliases: AliasTable,
}

impl SchemaMapper {
    /// Mapper over the template compiled into the binary.
    pub fn embedded(platform: &str) -> Result<Self, ConfigError> {
        let template = serde_json::from_str(EMBEDDED_TEMPLATE).map_err(|source| {
            ConfigError::Template {
                path: "<embedded>".to_string(),
                source,
            }
        })?;
        Self::with_template(template, platform)
    }

    /// Mapper over a template read from `path`.
    #[instrument(level = "info", skip(platform))]
    pub async fn load(path: &Path, platform: &str) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let template = serde_json::from_str(&raw).map_err(|source| ConfigError::Template {
            path: shown.clone(),
            source,
        })?;
        info!(path = %shown, "Loaded schema template");
        Self::with_template(template, platform)
    }

    pub fn with_template(template: Value, platform: &str) -> Result<Self, ConfigError> {
        if !template.is_object() {
            return Err(ConfigError::Invalid(
                "schema template must be a JSON object".to_string(),
            ));
        }
        Ok(Self {
            template,
            platform: platform.to_string(),
            aliases: ALIASES,
        })
    }

    /// Build the canonical record for one merged URL.
    ///
    /// # Returns
    ///
    /// - the flat error shape when no pass produced content
    /// - otherwise a fresh copy of the template with aliases resolved; a
    ///   record with failed passes also carries a root `error` and
    ///   `metadata.errors`
    ///
    /// The template itself is never modified.
    pub fn map(&self, merged: &MergedRecord) -> CanonicalRecord {
        let scraped_at = merged
            .scraped_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        if !merged.has_content {
            let error = merged
                .errors
                .last()
                .map(ToString::to_string)
                .unwrap_or_else(|| "ExtractionFailure: no pass produced content".to_string());
            debug!(url = %merged.source_url, %error, "Mapping to error shape");
            return CanonicalRecord(json!({
                "platform": self.platform,
                "source": self.platform,
                "url": merged.source_url,
                "error": error,
                "scraped_at": scraped_at,
            }));
        }

        let mut doc = self.template.clone();
        for (path, candidates) in self.aliases {
            let (parents, leaf) = split_path(path);
            let parent = walk_or_create(&mut doc, &parents);
            match candidates
                .iter()
                .filter_map(|name| merged.get(name))
                .find(|value| value.is_truthy())
            {
                Some(value) => {
                    parent.insert(leaf.to_string(), value.to_json());
                }
                None => {
                    parent.entry(leaf).or_insert(Value::Null);
                }
            }
        }

        let root = walk_or_create(&mut doc, &[]);
        root.insert("platform".into(), Value::from(self.platform.as_str()));
        root.insert("source".into(), Value::from(self.platform.as_str()));

        let metadata = walk_or_create(&mut doc, &["metadata"]);
        metadata.insert("scraped_at".into(), Value::from(scraped_at));
        if let Some(last) = merged.errors.last() {
            let errors = merged
                .errors
                .iter()
                .map(|e| json!({"pass": e.pass.to_string(), "kind": e.kind, "message": e.message}))
                .collect();
            metadata.insert("errors".into(), Value::Array(errors));

            // A failed pass still flags the record, even when the other pass had content.
            debug!(url = %merged.source_url, error = %last, "Content record carries a pass error");
            walk_or_create(&mut doc, &[]).insert("error".into(), Value::from(last.to_string()));
        }

        CanonicalRecord(doc)
    }
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let leaf = parts.pop().unwrap_or(path);
    (parts, leaf)
}

/// Descend through `keys`, replacing anything that is not an object on the way.
fn walk_or_create<'a>(doc: &'a mut Value, keys: &[&str]) -> &'a mut Map<String, Value> {
    let mut node = doc;
    for key in keys {
        node = ensure_object(node)
            .entry(*key)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("replaced with an object above"),
    }
}
