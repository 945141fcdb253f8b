//! Stealth session setup.
//!
//! Every run uses exactly one tab, configured once with a randomly chosen
//! fingerprint before the first navigation:
//!
//! - a user agent drawn from [`USER_AGENTS`]
//! - a viewport between 1200x700 and 1400x900
//! - the fixed `en-US` locale
//! - a startup script that makes `navigator.webdriver` read as `undefined`
//!
//! This only covers surface-level fingerprinting. CAPTCHAs and proxy
//! rotation are out of scope.

use super::chromium::{ChromiumBrowser, ChromiumPage};
use crate::errors::ScrapeError;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::ops::RangeInclusive;
use tracing::{info, instrument};

/// Desktop user agents spanning Windows, macOS and Linux, Chrome and Safari.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

pub const VIEWPORT_WIDTH: RangeInclusive<i64> = 1200..=1400;
pub const VIEWPORT_HEIGHT: RangeInclusive<i64> = 700..=900;
pub const LOCALE: &str = "en-US";

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// The fingerprint applied to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthProfile {
    pub user_agent: &'static str,
    pub width: i64,
    pub height: i64,
    pub locale: &'static str,
}

impl StealthProfile {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            user_agent: USER_AGENTS.choose(rng).copied().unwrap_or(USER_AGENTS[0]),
            width: rng.random_range(VIEWPORT_WIDTH),
            height: rng.random_range(VIEWPORT_HEIGHT),
            locale: LOCALE,
        }
    }
}

/// Opens the single shared tab of a pipeline run.
#[derive(Debug, Default)]
pub struct StealthSessionFactory;

impl StealthSessionFactory {
    /// Open a tab on `browser` and apply a fresh random [`StealthProfile`].
    #[instrument(level = "info", skip_all)]
    pub async fn create(&self, browser: &ChromiumBrowser) -> Result<ChromiumPage, ScrapeError> {
        let profile = StealthProfile::random(&mut rand::rng());
        let page = browser.new_page().await?;
        apply(&page, &profile).await?;
        info!(
            user_agent = profile.user_agent,
            width = profile.width,
            height = profile.height,
            locale = profile.locale,
            "Stealth session ready"
        );
        Ok(page)
    }
}

async fn apply(page: &ChromiumPage, profile: &StealthProfile) -> Result<(), ScrapeError> {
    let cdp = page.cdp();
    let setup = |step: &str, e: String| ScrapeError::SessionSetup(format!("{step}: {e}"));

    let user_agent = SetUserAgentOverrideParams::builder()
        .user_agent(profile.user_agent)
        .accept_language(profile.locale)
        .build()
        .map_err(|e| setup("user agent", e))?;
    cdp.execute(user_agent)
        .await
        .map_err(|e| setup("user agent", e.to_string()))?;

    cdp.execute(SetDeviceMetricsOverrideParams::new(profile.width, profile.height, 1.0, false))
        .await
        .map_err(|e| setup("viewport", e.to_string()))?;

    cdp.execute(SetLocaleOverrideParams::builder().locale(profile.locale).build())
        .await
        .map_err(|e| setup("locale", e.to_string()))?;

    cdp.execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER_SCRIPT))
        .await
        .map_err(|e| setup("init script", e.to_string()))?;
    Ok(())
}
