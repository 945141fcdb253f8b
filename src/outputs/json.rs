//! Flat-file JSON sink.
//!
//! The batch is written as one pretty-printed UTF-8 array, replacing any
//! existing file. Storage-assigned `_id` fields are removed first so a batch
//! that already went through a document store serialises cleanly.

use crate::errors::OutputError;
use crate::models::CanonicalRecord;
use crate::utils::ensure_parent_dir;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Write `records` to `path` and return how many were written.
///
/// An empty batch leaves the destination untouched.
#[instrument(level = "info", skip(records), fields(path = %path.display(), count = records.len()))]
pub async fn write_records(records: &[CanonicalRecord], path: &Path) -> Result<usize, OutputError> {
    if records.is_empty() {
        warn!("No records to write");
        return Ok(0);
    }

    let cleaned: Vec<Value> = records
        .iter()
        .cloned()
        .map(|record| {
            let mut value = record.into_value();
            if let Some(obj) = value.as_object_mut() {
                obj.remove("_id");
            }
            value
        })
        .collect();
    let json = serde_json::to_string_pretty(&cleaned)?;

    let io_err = |source| OutputError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Err(e) = ensure_parent_dir(path).await {
        error!(error = %e, "Failed to create output directory");
        return Err(io_err(e));
    }
    fs::write(path, json).await.map_err(io_err)?;

    info!(count = cleaned.len(), "Wrote JSON output");
    Ok(cleaned.len())
}
