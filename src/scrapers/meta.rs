//! Metadata pass: head tags, anchors and contacts found in them.
//!
//! The title prefers `og:title`, then `<meta name="title">`, then the live
//! `document.title`. The description prefers `<meta name="description">`,
//! then `og:description`. External links are absolute http(s) hrefs that do
//! not mention the platform's own domains, deduplicated and capped at
//! [`MAX_EXTERNAL_LINKS`]. Emails and phones are scanned from title plus
//! description only.
//!
//! Before the first page of the pass, images, fonts and stylesheets are
//! blocked for the rest of the session.

use super::{Extractor, PageKind};
use crate::browser::{PageDriver, ResourceKind};
use crate::config::PlatformConfig;
use crate::errors::ScrapeError;
use crate::models::{FieldMap, FieldValue, PassTag, ScrapeTarget};
use crate::navigator::ResilientNavigator;
use crate::utils::dedupe_keep_order;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

pub const MAX_EXTERNAL_LINKS: usize = 20;

pub const TITLE_SCRIPT: &str = "document.title";

const BLOCKED_RESOURCES: &[ResourceKind] =
    &[ResourceKind::Image, ResourceKind::Font, ResourceKind::Stylesheet];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().\-]{8,}\d").expect("valid phone regex"));

/// Content emitted by the metadata pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFields {
    pub page_kind: PageKind,
    pub username: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub external_links: Vec<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

impl MetaFields {
    pub fn into_field_map(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("type".into(), self.page_kind.as_str().into());
        if let Some(username) = self.username {
            fields.insert("username".into(), username.into());
        }
        fields.insert("title".into(), self.title.into());
        fields.insert("description".into(), self.description.into());
        fields.insert("external_links".into(), FieldValue::List(self.external_links));
        fields.insert("emails".into(), FieldValue::List(self.emails));
        fields.insert("phones".into(), FieldValue::List(self.phones));
        fields
    }
}

pub struct MetaExtractor {
    navigator: ResilientNavigator,
    platform: PlatformConfig,
}

impl MetaExtractor {
    pub fn new(navigator: ResilientNavigator, platform: PlatformConfig) -> Self {
        Self { navigator, platform }
    }
}

impl Extractor for MetaExtractor {
    const PASS: PassTag = PassTag::Meta;

    async fn prepare<P: PageDriver>(&self, page: &P) {
        if let Err(e) = page.block_resources(BLOCKED_RESOURCES).await {
            warn!(error = %e, "Could not block heavy resources; continuing without");
        }
    }

    #[instrument(level = "info", skip(self, page), fields(url = %target))]
    async fn extract<P: PageDriver>(
        &self,
        page: &P,
        target: &ScrapeTarget,
    ) -> Result<FieldMap, ScrapeError> {
        self.navigator.navigate(page, target.as_str()).await?;
        let html = page.content().await?;
        let live_title = page
            .evaluate(TITLE_SCRIPT)
            .await?
            .as_str()
            .map(|t| t.trim().to_string());

        let fields = parse_meta(&html, live_title, target.as_str(), &self.platform)?;
        debug!(
            title = ?fields.title,
            links = fields.external_links.len(),
            emails = fields.emails.len(),
            "Parsed metadata"
        );
        Ok(fields.into_field_map())
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Extraction(format!("bad selector {css}: {e}")))
}

/// Trimmed, non-empty `content` of the first element matching `css`.
fn meta_content(document: &Html, css: &str) -> Result<Option<String>, ScrapeError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string))
}

/// Build the metadata fields from a page's HTML.
pub fn parse_meta(
    html: &str,
    live_title: Option<String>,
    url: &str,
    platform: &PlatformConfig,
) -> Result<MetaFields, ScrapeError> {
    let document = Html::parse_document(html);

    let title = match meta_content(&document, r#"meta[property="og:title"]"#)? {
        Some(t) => Some(t),
        None => meta_content(&document, r#"meta[name="title"]"#)?,
    }
    .or_else(|| live_title.filter(|t| !t.is_empty()));

    let description = match meta_content(&document, r#"meta[name="description"]"#)? {
        Some(d) => Some(d),
        None => meta_content(&document, r#"meta[property="og:description"]"#)?,
    };

    let anchors = selector("a[href]")?;
    let hrefs = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string);
    let external_links = external_links(hrefs, &platform.excluded_link_domains);

    let blob = [title.as_deref(), description.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let (emails, phones) = find_contacts(&blob);

    let page_kind = PageKind::classify(url);
    let username = match page_kind {
        PageKind::Profile => profile_username(url),
        PageKind::Question => None,
    };

    Ok(MetaFields {
        page_kind,
        username,
        title,
        description,
        external_links,
        emails,
        phones,
    })
}

/// Absolute http(s) links that do not reference any excluded domain.
pub fn external_links<I>(hrefs: I, excluded_domains: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let candidates = hrefs.into_iter().filter(|h| {
        let lower = h.to_lowercase();
        lower.starts_with("http")
            && !excluded_domains
                .iter()
                .any(|domain| lower.contains(&domain.to_lowercase()))
    });
    let mut links = dedupe_keep_order(candidates);
    links.truncate(MAX_EXTERNAL_LINKS);
    links
}

/// Distinct emails and phone numbers in `text`.
pub fn find_contacts(text: &str) -> (Vec<String>, Vec<String>) {
    let emails = dedupe_keep_order(EMAIL_RE.find_iter(text).map(|m| m.as_str()));
    let phones = dedupe_keep_order(PHONE_RE.find_iter(text).map(|m| m.as_str()));
    (emails, phones)
}

/// `Adam-D-Angelo` from `https://www.quora.com/profile/Adam-D-Angelo/answers`.
fn profile_username(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|s| s.eq_ignore_ascii_case("profile"))?;
    segments.next().filter(|s| !s.is_empty()).map(str::to_string)
}
