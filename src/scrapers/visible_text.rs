//! Visible-text pass: what a reader actually sees on the rendered page.
//!
//! For every target the pass:
//! 1. navigates and waits (bounded) for the main content container
//! 2. dismisses the sign-in dialog if one shows up (best-effort)
//! 3. scrolls to the bottom a fixed number of times so lazy content loads
//! 4. clicks "more" buttons in rounds until a round clicks nothing
//! 5. snapshots the question title, answer bodies and authors, and all hrefs
//!
//! The snapshot is then turned into a full-text blob (title and answers
//! separated by blank lines), external vs. platform links, contacts found in
//! the blob and, on profile pages, follower/answer counters.

use super::{Extractor, PageKind};
use crate::browser::{wait_until, PageDriver};
use crate::config::{PlatformConfig, VisibleTextConfig};
use crate::errors::ScrapeError;
use crate::models::{FieldMap, FieldValue, PassTag, ScrapeTarget};
use crate::navigator::ResilientNavigator;
use crate::utils::{dedupe_keep_order, normalize_text, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::{Position, Url};

pub const CONTENT_PRESENT_SCRIPT: &str =
    r#"document.querySelector('div[id*="mainContent"]') !== null"#;

/// Clicks the dialog close button when it is visible; returns whether it did.
pub const DISMISS_DIALOG_SCRIPT: &str = r#"(() => {
  const button = document.querySelector('button[aria-label="Close"], [aria-label="Close dialog"]');
  if (!button || button.getClientRects().length === 0) return false;
  button.click();
  return true;
})()"#;

pub const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Clicks every visible button whose label contains "more"; returns the click count.
pub const EXPAND_SCRIPT: &str = r#"(() => {
  let clicked = 0;
  for (const button of document.querySelectorAll('button')) {
    const label = (button.innerText || '').toLowerCase();
    if (!label.includes('more') || button.getClientRects().length === 0) continue;
    try { button.click(); clicked += 1; } catch (e) {}
  }
  return clicked;
})()"#;

pub const SNAPSHOT_SCRIPT: &str = r#"(() => {
  const text = (el) => (el ? el.innerText || el.textContent || '' : '');
  const title = document.querySelector('div[data-testid="QuestionPage-Question-title"] span.qu-bold');
  const answers = Array.from(document.querySelectorAll('div[data-testid^="Answer-TopLevel"]')).map((block) => {
    const author = block.querySelector('a[href*="/profile/"]');
    return {
      body: text(block.querySelector('div[data-testid="Answer-body-text"]')),
      author: author ? text(author) : null,
    };
  });
  return {
    title: title ? text(title) : null,
    answers,
    hrefs: Array.from(document.querySelectorAll('a[href]')).map((a) => a.getAttribute('href')),
    main_text: text(document.querySelector('div[id*="mainContent"]')),
  };
})()"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9.\-+_]+@[a-z0-9.\-+_]+\.[a-z]+").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?\d{1,3})?[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid phone regex")
});
static COUNTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([km])?\s+(followers?|following|answers?|questions?)\b")
        .expect("valid counter regex")
});

/// Raw page state returned by [`SNAPSHOT_SCRIPT`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct VisibleSnapshot {
    pub title: Option<String>,
    pub answers: Vec<AnswerBlock>,
    pub hrefs: Vec<Option<String>>,
    pub main_text: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AnswerBlock {
    pub body: String,
    pub author: Option<String>,
}

/// Counters shown on a profile header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileCounters {
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub answers: Option<i64>,
    pub questions: Option<i64>,
}

/// Content emitted by the visible-text pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleFields {
    pub question_title: Option<String>,
    pub text: String,
    pub external_links: Vec<String>,
    pub platform_links: Vec<String>,
    pub answer_authors: Vec<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub counters: Option<ProfileCounters>,
}

impl VisibleFields {
    pub fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("question_title".into(), self.question_title.into());
        fields.insert("text".into(), self.text.into());
        fields.insert("external_links".into(), self.external_links.into());
        fields.insert("quora_links".into(), self.platform_links.into());
        fields.insert("answer_authors".into(), self.answer_authors.into());
        fields.insert("emails".into(), self.emails.into());
        fields.insert("phones".into(), self.phones.into());
        if let Some(counters) = self.counters {
            let named = [
                ("followers", counters.followers),
                ("following", counters.following),
                ("answers_count", counters.answers),
                ("questions_count", counters.questions),
            ];
            for (name, value) in named {
                if let Some(n) = value {
                    fields.insert(name.into(), FieldValue::Integer(n));
                }
            }
        }
        fields
    }
}

pub struct VisibleTextExtractor {
    navigator: ResilientNavigator,
    platform: PlatformConfig,
    origin: Url,
    settings: VisibleTextConfig,
}

impl VisibleTextExtractor {
    pub fn new(
        navigator: ResilientNavigator,
        platform: PlatformConfig,
        settings: VisibleTextConfig,
    ) -> Result<Self, ScrapeError> {
        let origin = Url::parse(&platform.origin).map_err(|e| {
            ScrapeError::SessionSetup(format!("invalid platform origin {}: {e}", platform.origin))
        })?;
        Ok(Self {
            navigator,
            platform,
            origin,
            settings,
        })
    }

    async fn dismiss_dialog<P: PageDriver>(&self, page: &P) {
        let wait = Duration::from_millis(self.settings.dialog_wait_ms);
        match wait_until(page, DISMISS_DIALOG_SCRIPT, wait, POLL_INTERVAL).await {
            Ok(true) => debug!("Dismissed intro dialog"),
            Ok(false) => {}
            Err(e) => debug!(error = %e, "Dialog check failed; ignoring"),
        }
    }

    async fn scroll_to_bottom<P: PageDriver>(&self, page: &P) -> Result<(), ScrapeError> {
        let settle = Duration::from_millis(self.settings.scroll_settle_ms);
        for _ in 0..self.settings.scroll_rounds {
            page.evaluate(SCROLL_SCRIPT).await?;
            sleep(settle).await;
        }
        Ok(())
    }

    /// Returns the number of rounds that clicked at least one button.
    async fn click_expanders<P: PageDriver>(&self, page: &P) -> u32 {
        let settle = Duration::from_millis(self.settings.expand_settle_ms);
        let mut productive = 0;
        for round in 0..self.settings.expand_rounds {
            let clicked = match page.evaluate(EXPAND_SCRIPT).await {
                Ok(value) => value.as_u64().unwrap_or(0),
                Err(e) => {
                    warn!(round, error = %e, "Expand round failed");
                    0
                }
            };
            if clicked == 0 {
                break;
            }
            debug!(round, clicked, "Expanded truncated content");
            productive += 1;
            sleep(settle).await;
        }
        productive
    }
}

impl Extractor for VisibleTextExtractor {
    const PASS: PassTag = PassTag::VisibleText;

    #[instrument(level = "info", skip(self, page), fields(url = %target))]
    async fn extract<P: PageDriver>(
        &self,
        page: &P,
        target: &ScrapeTarget,
    ) -> Result<FieldMap, ScrapeError> {
        self.navigator.navigate(page, target.as_str()).await?;

        let content_wait = Duration::from_millis(self.settings.content_wait_ms);
        if !wait_until(page, CONTENT_PRESENT_SCRIPT, content_wait, POLL_INTERVAL).await? {
            return Err(ScrapeError::Extraction(format!(
                "main content did not appear within {}ms",
                self.settings.content_wait_ms
            )));
        }

        self.dismiss_dialog(page).await;
        self.scroll_to_bottom(page).await?;
        let rounds = self.click_expanders(page).await;

        let raw = page.evaluate(SNAPSHOT_SCRIPT).await?;
        let snapshot: VisibleSnapshot = serde_json::from_value(raw.clone()).map_err(|e| {
            debug!(payload = %truncate_for_log(&raw.to_string(), 300), "Unexpected snapshot shape");
            ScrapeError::Extraction(format!("malformed page snapshot: {e}"))
        })?;

        let fields = build_fields(snapshot, target.as_str(), &self.origin, &self.platform.domain);
        debug!(
            expand_rounds = rounds,
            text_bytes = fields.text.len(),
            authors = fields.answer_authors.len(),
            "Extracted visible text"
        );
        Ok(fields.into_field_map())
    }
}

/// Turn a page snapshot into the pass's content fields.
pub fn build_fields(snapshot: VisibleSnapshot, url: &str, origin: &Url, domain: &str) -> VisibleFields {
    let question_title = snapshot
        .title
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty());

    let mut bodies = Vec::new();
    let mut authors = Vec::new();
    for answer in &snapshot.answers {
        let body = normalize_text(&answer.body);
        if !body.is_empty() {
            bodies.push(body);
        }
        if let Some(author) = answer.author.as_deref().map(normalize_text) {
            authors.push(author);
        }
    }

    let text = question_title
        .iter()
        .cloned()
        .chain(bodies)
        .collect::<Vec<_>>()
        .join("\n\n");

    let hrefs = dedupe_keep_order(snapshot.hrefs.into_iter().flatten());
    let (external_links, platform_links) = split_links(&hrefs, origin, domain);
    let (emails, phones) = find_contacts(&text);

    let counters = match PageKind::classify(url) {
        PageKind::Profile => Some(parse_counters(&snapshot.main_text)),
        PageKind::Question => None,
    };

    VisibleFields {
        question_title,
        text,
        external_links,
        platform_links,
        answer_authors: dedupe_keep_order(authors),
        emails,
        phones,
        counters,
    }
}

/// Partition hrefs into (external, platform) links.
///
/// Scheme-less hrefs are resolved against `origin`. External links are
/// reduced to scheme, host and path without a trailing slash. Non-http
/// schemes (`mailto:`, `javascript:`) are dropped.
pub fn split_links(hrefs: &[String], origin: &Url, domain: &str) -> (Vec<String>, Vec<String>) {
    let domain = domain.to_lowercase();
    let mut external = Vec::new();
    let mut internal = Vec::new();

    for href in hrefs {
        let href = href.trim();
        let resolved = match Url::parse(href) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => match origin.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            },
            Err(_) => continue,
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let host = resolved.host_str().unwrap_or_default().to_lowercase();
        if host.contains(&domain) {
            internal.push(resolved.to_string());
        } else {
            let cleaned = &resolved[..Position::AfterPath];
            external.push(cleaned.trim_end_matches('/').to_string());
        }
    }

    (dedupe_keep_order(external), dedupe_keep_order(internal))
}

/// Distinct emails and phone numbers in `text`.
pub fn find_contacts(text: &str) -> (Vec<String>, Vec<String>) {
    let emails = dedupe_keep_order(EMAIL_RE.find_iter(text).map(|m| m.as_str()));
    let phones = dedupe_keep_order(PHONE_RE.find_iter(text).map(|m| m.as_str().trim()));
    (emails, phones)
}

/// Read `1.2K followers`, `310 following`, `1 answer`, ... from profile text.
///
/// Singular and plural labels fill the same counter; the first occurrence wins.
pub fn parse_counters(text: &str) -> ProfileCounters {
    let mut counters = ProfileCounters::default();
    for caps in COUNTER_RE.captures_iter(text) {
        let Some(value) = parse_count(&caps[1], caps.get(2).map(|m| m.as_str())) else {
            continue;
        };
        let label = caps[3].to_lowercase();
        let slot = match label.trim_end_matches('s') {
            "follower" => &mut counters.followers,
            "following" => &mut counters.following,
            "answer" => &mut counters.answers,
            _ => &mut counters.questions,
        };
        slot.get_or_insert(value);
    }
    counters
}

fn parse_count(number: &str, suffix: Option<&str>) -> Option<i64> {
    let base: f64 = number.replace(',', "").parse().ok()?;
    let scale = match suffix.map(str::to_ascii_lowercase).as_deref() {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        _ => 1.0,
    };
    Some((base * scale).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use crate::scrapers::run_pass;
    use crate::testing::{FakeDocument, FakePage};
    use serde_json::json;

    const QUESTION_URL: &str = "https://www.quora.com/What-is-the-best-way-to-learn-Rust";
    const PROFILE_URL: &str = "https://www.quora.com/profile/Jane-Doe";

    fn origin() -> Url {
        Url::parse("https://www.quora.com").unwrap()
    }

    fn question_snapshot() -> serde_json::Value {
        json!({
            "title": "What is the best\u{a0}way to learn   Rust?",
            "answers": [
                {"body": "Read the book.\n\nEmail me: rustacean@example.org", "author": "Jane\u{a0}Doe"},
                {"body": "Write code daily. Call (555) 123-4567.", "author": "John Roe"},
                {"body": "   ", "author": "Jane Doe"}
            ],
            "hrefs": [
                "/profile/Jane-Doe",
                "https://www.quora.com/topic/Rust",
                "https://doc.rust-lang.org/book/?utm=1",
                "https://doc.rust-lang.org/book/",
                "mailto:rustacean@example.org",
                null
            ],
            "main_text": ""
        })
    }

    fn extractor() -> VisibleTextExtractor {
        VisibleTextExtractor::new(
            ResilientNavigator::default(),
            PlatformConfig::default(),
            VisibleTextConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_fields_for_question() {
        let snapshot: VisibleSnapshot = serde_json::from_value(question_snapshot()).unwrap();
        let fields = build_fields(snapshot, QUESTION_URL, &origin(), "quora.com");

        assert_eq!(
            fields.question_title.as_deref(),
            Some("What is the best way to learn Rust?")
        );
        assert_eq!(
            fields.text,
            "What is the best way to learn Rust?\n\nRead the book. Email me: rustacean@example.org\n\nWrite code daily. Call (555) 123-4567."
        );
        assert_eq!(fields.answer_authors, vec!["Jane Doe", "John Roe"]);
        assert_eq!(fields.external_links, vec!["https://doc.rust-lang.org/book"]);
        assert_eq!(
            fields.platform_links,
            vec![
                "https://www.quora.com/profile/Jane-Doe",
                "https://www.quora.com/topic/Rust"
            ]
        );
        assert_eq!(fields.emails, vec!["rustacean@example.org"]);
        assert_eq!(fields.phones, vec!["(555) 123-4567"]);
        assert_eq!(fields.counters, None);
    }

    #[test]
    fn test_split_links_resolves_relative_against_origin() {
        let hrefs = vec![
            "/topic/Startups".to_string(),
            "//cdn.example.com/app.js".to_string(),
            "javascript:void(0)".to_string(),
            "http://blog.example.com/post/".to_string(),
        ];
        let (external, internal) = split_links(&hrefs, &origin(), "quora.com");
        assert_eq!(internal, vec!["https://www.quora.com/topic/Startups"]);
        assert_eq!(
            external,
            vec!["https://cdn.example.com/app.js", "http://blog.example.com/post"]
        );
    }

    #[test]
    fn test_parse_counters() {
        let counters =
            parse_counters("Jane Doe\n1.2K followers · 310 following\n1,024 Answers 15 Questions 3M followers");
        assert_eq!(
            counters,
            ProfileCounters {
                followers: Some(1_200),
                following: Some(310),
                answers: Some(1_024),
                questions: Some(15),
            }
        );
        assert_eq!(parse_counters("nothing here"), ProfileCounters::default());
    }

    #[test]
    fn test_parse_singular_counters() {
        let counters = parse_counters("New here · 1 follower · 0 following · 1 Answer · 1 question");
        assert_eq!(
            counters,
            ProfileCounters {
                followers: Some(1),
                following: Some(0),
                answers: Some(1),
                questions: Some(1),
            }
        );
    }

    #[test]
    fn test_profile_counters_become_integer_fields() {
        let snapshot = VisibleSnapshot {
            main_text: "Jane Doe 12K followers 40 following 300 answers".into(),
            ..VisibleSnapshot::default()
        };
        let fields = build_fields(snapshot, PROFILE_URL, &origin(), "quora.com").into_field_map();
        assert_eq!(fields.get("followers"), Some(&FieldValue::Integer(12_000)));
        assert_eq!(fields.get("following"), Some(&FieldValue::Integer(40)));
        assert_eq!(fields.get("answers_count"), Some(&FieldValue::Integer(300)));
        assert_eq!(fields.get("questions_count"), None);
        assert_eq!(fields.get("question_title"), Some(&FieldValue::Null));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_pass_end_to_end() {
        let page = FakePage::new().with_document(
            QUESTION_URL,
            FakeDocument {
                visible: Some(question_snapshot()),
                has_dialog: true,
                expand_clicks: vec![3, 1],
                ..FakeDocument::default()
            },
        );
        let targets = ScrapeTarget::dedupe(&[QUESTION_URL]);

        let records = run_pass(&page, &extractor(), &targets, "quora").await;

        assert_eq!(records.len(), 1);
        let Outcome::Content(fields) = &records[0].outcome else {
            panic!("expected content, got {:?}", records[0].outcome);
        };
        assert_eq!(
            fields.get("answer_authors"),
            Some(&FieldValue::List(vec!["Jane Doe".into(), "John Roe".into()]))
        );
        assert_eq!(page.evaluations(SCROLL_SCRIPT), 5);
        // Two productive rounds, then one that clicks nothing.
        assert_eq!(page.evaluations(EXPAND_SCRIPT), 3);
        assert_eq!(page.evaluations(DISMISS_DIALOG_SCRIPT), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_content_container_is_an_extraction_failure() {
        let page = FakePage::new().with_document(QUESTION_URL, FakeDocument::default());
        let targets = ScrapeTarget::dedupe(&[QUESTION_URL]);

        let records = run_pass(&page, &extractor(), &targets, "quora").await;

        let Outcome::Failed(e) = &records[0].outcome else {
            panic!("expected failure");
        };
        assert_eq!(e.kind, "ExtractionFailure");
        assert!(e.message.contains("main content did not appear"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_rounds_are_capped() {
        let page = FakePage::new().with_document(
            QUESTION_URL,
            FakeDocument {
                visible: Some(question_snapshot()),
                expand_clicks: vec![1; 25],
                ..FakeDocument::default()
            },
        );
        let records = run_pass(&page, &extractor(), &ScrapeTarget::dedupe(&[QUESTION_URL]), "quora").await;
        assert!(!records[0].is_error());
        assert_eq!(page.evaluations(EXPAND_SCRIPT), 10);
    }
}
