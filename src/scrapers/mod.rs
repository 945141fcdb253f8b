//! Extraction passes over a batch of Quora pages.
//!
//! Each pass implements [`Extractor`] and is driven by [`run_pass`], which
//! visits the deduplicated targets strictly in order on the shared page and
//! produces exactly one [`RawRecord`] per target:
//!
//! | Pass | Module | Reads | Emits |
//! |------|--------|-------|-------|
//! | Metadata | [`meta`] | `<head>` meta tags, anchors | title, description, external links, contacts |
//! | Visible text | [`visible_text`] | rendered DOM after scrolling/expanding | question title, answers, authors, links, contacts, profile counters |
//!
//! A failure on one URL becomes an error record; the pass moves on.

pub mod meta;
pub mod visible_text;

use crate::browser::PageDriver;
use crate::errors::ScrapeError;
use crate::models::{FieldMap, PassTag, RawRecord, ScrapeTarget};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

/// Whether a URL points at a user profile or a question page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Profile,
    Question,
}

impl PageKind {
    pub fn classify(url: &str) -> Self {
        if url.to_lowercase().contains("/profile/") {
            PageKind::Profile
        } else {
            PageKind::Question
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Profile => "profile",
            PageKind::Question => "question",
        }
    }
}

/// One extraction pass.
pub trait Extractor {
    const PASS: PassTag;

    /// Runs once before the first target is visited.
    async fn prepare<P: PageDriver>(&self, _page: &P) {}

    /// Navigate to `target` and extract its content fields.
    async fn extract<P: PageDriver>(
        &self,
        page: &P,
        target: &ScrapeTarget,
    ) -> Result<FieldMap, ScrapeError>;
}

/// Run `extractor` over `targets` in order, one record per distinct target.
///
/// # Arguments
///
/// * `page` - The shared tab, owned by the caller
/// * `extractor` - The pass to run; [`Extractor::prepare`] is called once first
/// * `targets` - URLs to visit; repeats are dropped, first-seen order kept
/// * `platform` - Platform tag stamped on every record
///
/// # Returns
///
/// A content or error [`RawRecord`] per target. Never fails as a whole.
#[instrument(level = "info", skip_all, fields(pass = %E::PASS, count = targets.len()))]
pub async fn run_pass<P, E>(
    page: &P,
    extractor: &E,
    targets: &[ScrapeTarget],
    platform: &str,
) -> Vec<RawRecord>
where
    P: PageDriver,
    E: Extractor,
{
    let targets = ScrapeTarget::dedupe(targets);
    extractor.prepare(page).await;

    let records: Vec<RawRecord> = stream::iter(targets)
        .then(move |target| async move {
            match extractor.extract(page, &target).await {
                Ok(fields) => {
                    debug!(url = %target, fields = fields.len(), "Extracted page");
                    RawRecord::content(&target, platform, E::PASS, fields)
                }
                Err(e) => {
                    error!(url = %target, kind = e.kind(), error = %e, "Extraction failed; recording error");
                    RawRecord::failed(&target, platform, E::PASS, &e)
                }
            }
        })
        .collect()
        .await;

    let failed = records.iter().filter(|r| r.is_error()).count();
    info!(
        total = records.len(),
        ok = records.len() - failed,
        errors = failed,
        "Pass finished"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Outcome};
    use crate::testing::FakePage;

    struct FailSecond;

    impl Extractor for FailSecond {
        const PASS: PassTag = PassTag::Meta;

        async fn extract<P: PageDriver>(
            &self,
            _page: &P,
            target: &ScrapeTarget,
        ) -> Result<FieldMap, ScrapeError> {
            if target.as_str().ends_with("/2") {
                return Err(ScrapeError::Extraction("boom".into()));
            }
            let mut fields = FieldMap::new();
            fields.insert("title".into(), FieldValue::from(target.as_str()));
            Ok(fields)
        }
    }

    #[test]
    fn test_classify_page_kind() {
        assert_eq!(PageKind::classify("https://www.quora.com/profile/Adam"), PageKind::Profile);
        assert_eq!(PageKind::classify("https://www.quora.com/PROFILE/Adam"), PageKind::Profile);
        assert_eq!(
            PageKind::classify("https://www.quora.com/What-is-Rust"),
            PageKind::Question
        );
    }

    #[tokio::test]
    async fn test_run_pass_isolates_failures_and_dedupes() {
        let page = FakePage::new();
        let targets = ScrapeTarget::dedupe(&["https://q.test/1", "https://q.test/2", "https://q.test/3"]);
        let mut with_repeat = targets.clone();
        with_repeat.push(targets[0].clone());

        let records = run_pass(&page, &FailSecond, &with_repeat, "quora").await;

        assert_eq!(records.len(), 3);
        let urls: Vec<&str> = records.iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://q.test/1", "https://q.test/2", "https://q.test/3"]);
        assert!(matches!(records[0].outcome, Outcome::Content(_)));
        match &records[1].outcome {
            Outcome::Failed(e) => {
                assert_eq!(e.kind, "ExtractionFailure");
                assert_eq!(e.pass, PassTag::Meta);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(records[2].outcome, Outcome::Content(_)));
        assert!(records.iter().all(|r| r.platform == "quora" && r.pass == PassTag::Meta));
    }
}
