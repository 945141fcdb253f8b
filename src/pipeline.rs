//! Batch orchestration.
//!
//! One run owns exactly one Chromium instance and one stealth tab. The
//! metadata pass visits every distinct URL, then the visible-text pass
//! visits the same list on the same tab, strictly one navigation at a time.
//! The results are merged per URL and mapped onto the canonical schema.
//!
//! ```text
//! urls ──dedupe──▶ meta pass ──┐
//!                              ├──▶ merge ──▶ schema map ──▶ records
//!        visible-text pass ────┘
//! ```
//!
//! The browser is closed whether or not the passes succeed.

use crate::browser::chromium::ChromiumBrowser;
use crate::browser::stealth::StealthSessionFactory;
use crate::browser::PageDriver;
use crate::config::PipelineConfig;
use crate::errors::ScrapeError;
use crate::merge::merge;
use crate::models::{CanonicalRecord, ScrapeTarget};
use crate::navigator::ResilientNavigator;
use crate::schema::SchemaMapper;
use crate::scrapers::meta::MetaExtractor;
use crate::scrapers::run_pass;
use crate::scrapers::visible_text::VisibleTextExtractor;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub struct Pipeline {
    config: PipelineConfig,
    mapper: SchemaMapper,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, mapper: SchemaMapper) -> Self {
        Self { config, mapper }
    }

    /// Scrape `urls` and return one canonical record per distinct URL.
    ///
    /// Per-URL failures become error-shaped records. Only browser launch and
    /// session setup failures are returned as `Err`.
    #[instrument(level = "info", skip(self, urls), fields(count = urls.len()))]
    pub async fn run(&self, urls: &[String], headless: bool) -> Result<Vec<CanonicalRecord>, ScrapeError> {
        let targets = ScrapeTarget::dedupe(urls);
        if targets.is_empty() {
            info!("No URLs to scrape");
            return Ok(Vec::new());
        }

        let browser = ChromiumBrowser::launch(&self.config.browser, headless).await?;
        let result = match StealthSessionFactory.create(&browser).await {
            Ok(page) => self.run_with_page(&page, &targets).await,
            Err(e) => Err(e),
        };
        browser.close().await;
        result
    }

    /// Run both passes over `targets` on an already prepared page.
    #[instrument(level = "info", skip_all, fields(count = targets.len()))]
    pub async fn run_with_page<P: PageDriver>(
        &self,
        page: &P,
        targets: &[ScrapeTarget],
    ) -> Result<Vec<CanonicalRecord>, ScrapeError> {
        let t0 = Instant::now();
        let platform = self.config.platform.name.as_str();
        let navigator = ResilientNavigator::from_config(&self.config.navigation);

        let meta = MetaExtractor::new(navigator.clone(), self.config.platform.clone());
        let meta_records = run_pass(page, &meta, targets, platform).await;

        let visible = VisibleTextExtractor::new(
            navigator,
            self.config.platform.clone(),
            self.config.visible_text.clone(),
        )?;
        let visible_records = run_pass(page, &visible, targets, platform).await;

        let records: Vec<CanonicalRecord> = merge(meta_records, visible_records, platform)
            .iter()
            .map(|merged| self.mapper.map(merged))
            .collect();

        let mut errors = 0;
        for record in records.iter().filter(|r| r.is_error()) {
            errors += 1;
            warn!(
                url = record.url().unwrap_or_default(),
                error = record.get("error").and_then(|e| e.as_str()).unwrap_or_default(),
                "Record carries a pass error"
            );
        }
        info!(
            total = records.len(),
            errors,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        Ok(records)
    }
}
