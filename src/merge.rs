//! Fold the per-pass records of each URL into one [`MergedRecord`].
//!
//! Records are applied metadata pass first, visible-text pass second. Content
//! fields overwrite one at a time, so a field only one pass emits survives
//! untouched. Output order is first-seen URL order across both inputs.

use crate::models::{FieldValue, MergedRecord, Outcome, RawRecord};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Merge the records of both passes by source URL.
///
/// # Arguments
///
/// * `meta` - Records of the metadata pass, applied first
/// * `visible` - Records of the visible-text pass, applied second so its
///   values win on shared fields
/// * `platform` - Stamped as `platform` and `source` over whatever the passes wrote
///
/// # Returns
///
/// One [`MergedRecord`] per distinct URL, in first-seen order. Records with
/// an empty source URL are dropped.
#[instrument(level = "info", skip_all, fields(meta = meta.len(), visible = visible.len()))]
pub fn merge(meta: Vec<RawRecord>, visible: Vec<RawRecord>, platform: &str) -> Vec<MergedRecord> {
    let mut merged: Vec<MergedRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in meta.into_iter().chain(visible) {
        if record.source_url.is_empty() {
            warn!(pass = %record.pass, "Dropping record without a source URL");
            continue;
        }

        let slot = *index.entry(record.source_url.clone()).or_insert_with(|| {
            merged.push(MergedRecord::new(&record.source_url));
            merged.len() - 1
        });
        let target = &mut merged[slot];

        target.scraped_at = Some(
            target
                .scraped_at
                .map_or(record.scraped_at, |t| t.max(record.scraped_at)),
        );
        match record.outcome {
            Outcome::Content(fields) => {
                target.has_content = true;
                target.fields.extend(fields);
            }
            Outcome::Failed(e) => {
                debug!(url = %record.source_url, pass = %e.pass, kind = %e.kind, "Carrying pass error");
                target.errors.push(e);
            }
        }
    }

    for record in &mut merged {
        record.fields.insert("platform".into(), FieldValue::from(platform));
        record.fields.insert("source".into(), FieldValue::from(platform));
    }
    merged
}
