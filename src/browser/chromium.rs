//! Chromium-backed [`PageDriver`] using chromiumoxide.

use super::{PageDriver, ResourceKind};
use crate::config::LaunchConfig;
use crate::errors::{BrowserError, ScrapeError};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Switches that hide the most obvious automation markers.
const HARDENING_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--disable-extensions",
];

/// A running Chromium instance and its CDP event loop.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch Chromium. Any failure here is fatal for the run.
    #[instrument(level = "info", skip(config))]
    pub async fn launch(config: &LaunchConfig, headless: bool) -> Result<Self, ScrapeError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if !headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        for arg in HARDENING_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg.as_str());
        }
        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::SessionSetup(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::SessionSetup(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        info!(headless, "Chromium launched");
        Ok(Self { browser, handler })
    }

    /// Open a blank tab.
    pub async fn new_page(&self) -> Result<ChromiumPage, ScrapeError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::SessionSetup(format!("failed to open tab: {e}")))?;
        Ok(ChromiumPage { page })
    }

    /// Shut the browser down. Failures are logged, never raised.
    #[instrument(level = "info", skip_all)]
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close command failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.handler.abort();
        info!("Chromium closed");
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Raw CDP page, for session configuration.
    pub(crate) fn cdp(&self) -> &Page {
        &self.page
    }
}

fn resource_type(kind: ResourceKind) -> ResourceType {
    match kind {
        ResourceKind::Image => ResourceType::Image,
        ResourceKind::Font => ResourceType::Font,
        ResourceKind::Stylesheet => ResourceType::Stylesheet,
    }
}

impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let navigation = async {
            // Subscribe first so the new document's DOMContentLoaded cannot be missed.
            let mut dom_ready = self
                .page
                .event_listener::<EventDomContentEventFired>()
                .await
                .map_err(|e| BrowserError::Protocol(e.to_string()))?;
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            if let Some(error_text) = response.result.error_text.as_ref() {
                return Err::<(), BrowserError>(BrowserError::Navigation(error_text.clone()));
            }
            // Same-document navigations commit no new document.
            if response.result.loader_id.is_none() {
                return Ok(());
            }
            match dom_ready.next().await {
                Some(_) => Ok(()),
                None => Err(BrowserError::Protocol(
                    "page event stream closed before DOMContentLoaded".to_string(),
                )),
            }
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(timeout)),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(BrowserError::Script)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), BrowserError> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        // Only the blocked kinds are intercepted, so every paused request is refused.
        let page = self.page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = page.execute(fail).await {
                    debug!(error = %e, "Failed to abort intercepted request");
                }
            }
        });

        let patterns: Vec<RequestPattern> = kinds
            .iter()
            .map(|kind| {
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(resource_type(*kind))
                    .request_stage(RequestStage::Request)
                    .build()
            })
            .collect();
        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        debug!(?kinds, "Request interception enabled");
        Ok(())
    }
}
