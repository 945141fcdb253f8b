//! Browser capability consumed by the extraction pipeline.
//!
//! The pipeline never talks to Chromium directly. It drives a [`PageDriver`],
//! a single tab that can navigate, run scripts and hand back its HTML. The
//! production implementation lives in [`chromium`]; [`stealth`] configures
//! the shared tab before any navigation happens.

pub mod chromium;
pub mod stealth;

use crate::errors::BrowserError;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Resource types that can be refused before they hit the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Font,
    Stylesheet,
}

/// A single browser tab.
///
/// Calls suspend while the browser works; callers serialise them, so an
/// implementation never sees two commands in flight at once.
pub trait PageDriver {
    /// Navigate and wait until the DOM content has loaded (not the full load).
    ///
    /// Must fail with [`BrowserError::Timeout`] when `timeout` elapses first.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Evaluate a script expression and return its JSON value (`null` for `undefined`).
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    /// Serialised HTML of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Abort every subsequent request for the given resource kinds.
    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), BrowserError>;
}

/// Poll `script` until it evaluates to `true` or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout; script errors are propagated.
pub async fn wait_until<P: PageDriver>(
    page: &P,
    script: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<bool, BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.evaluate(script).await?.as_bool() == Some(true) {
            return Ok(true);
        }
        if Instant::now() + poll > deadline {
            return Ok(false);
        }
        sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gives_up_after_timeout() {
        let page = FakePage::new();
        let started = Instant::now();
        let found = wait_until(
            &page,
            "document.querySelector('#never') !== null",
            Duration::from_secs(5),
            Duration::from_millis(250),
        )
        .await
        .unwrap();
        assert!(!found);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(4_750));
        assert!(waited <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_returns_when_true() {
        let page = FakePage::new().with_script_result("ready()", serde_json::json!(true));
        let started = Instant::now();
        assert!(wait_until(&page, "ready()", Duration::from_secs(5), Duration::from_millis(250))
            .await
            .unwrap());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
