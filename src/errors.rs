//! Error types for the extraction pipeline.
//!
//! Failures are split by where they can occur:
//! - [`BrowserError`]: raised by a [`PageDriver`](crate::browser::PageDriver)
//!   implementation (the browser capability itself)
//! - [`ScrapeError`]: the pipeline taxonomy. Navigation and extraction
//!   failures are local to one URL and end up inside an error record;
//!   session setup failures abort the whole run.
//! - [`ConfigError`] and [`OutputError`]: ambient failures around the core.

use std::time::Duration;
use thiserror::Error;

/// A failure reported by the browser capability.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout(_))
    }
}

/// Classified pipeline failures.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Every navigation attempt timed out.
    #[error("{url} timed out after {attempts} attempt(s): {source}")]
    NavigationTimeout {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },
    /// Navigation kept failing for a reason other than a timeout.
    #[error("{url} failed after {attempts} attempt(s): {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },
    /// Expected content was missing or malformed.
    #[error("{0}")]
    Extraction(String),
    /// The browser or its stealth session could not be created.
    #[error("session setup failed: {0}")]
    SessionSetup(String),
}

impl ScrapeError {
    /// Stable name used in the `error` field of error records.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::NavigationTimeout { .. } => "NavigationTimeout",
            ScrapeError::Navigation { .. } => "NavigationError",
            ScrapeError::Extraction(_) => "ExtractionFailure",
            ScrapeError::SessionSetup(_) => "SessionSetupFailure",
        }
    }

    /// Only session-level failures abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::SessionSetup(_))
    }
}

/// Script failures during extraction are content problems, not navigation ones.
impl From<BrowserError> for ScrapeError {
    fn from(e: BrowserError) -> Self {
        ScrapeError::Extraction(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid schema template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        let timeout = ScrapeError::NavigationTimeout {
            url: "https://www.quora.com/a".to_string(),
            attempts: 3,
            source: BrowserError::Timeout(Duration::from_millis(30_000)),
        };
        assert_eq!(timeout.kind(), "NavigationTimeout");
        assert_eq!(ScrapeError::Extraction("x".into()).kind(), "ExtractionFailure");
        assert_eq!(ScrapeError::SessionSetup("x".into()).kind(), "SessionSetupFailure");
    }

    #[test]
    fn test_only_session_setup_is_fatal() {
        assert!(ScrapeError::SessionSetup("no browser".into()).is_fatal());
        assert!(!ScrapeError::Extraction("missing title".into()).is_fatal());
        let nav = ScrapeError::Navigation {
            url: "u".into(),
            attempts: 1,
            source: BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()),
        };
        assert!(!nav.is_fatal());
    }

    #[test]
    fn test_timeout_message_mentions_duration() {
        let e = BrowserError::Timeout(Duration::from_millis(1500));
        assert_eq!(e.to_string(), "navigation timed out after 1500ms");
        assert!(e.is_timeout());
    }
}
