//! Small helpers for text normalization, ordered deduplication, logging and
//! output paths.

use itertools::Itertools;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Collapse every whitespace run (non-breaking spaces included) to a single
/// ASCII space and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_text("  a\u{a0}\u{a0}b\n\tc "), "a b c");
/// ```
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Drop empty strings and repeats, keeping first-seen order.
pub fn dedupe_keep_order<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .filter(|s: &String| !s.is_empty())
        .unique()
        .collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary) and
/// suffixed with the number of bytes dropped.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Make sure the directory that will hold `path` exists.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            debug!(parent = %parent.display(), "Output directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
