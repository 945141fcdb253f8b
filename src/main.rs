//! # Quora Leads
//!
//! A lead extraction pipeline that drives a stealth-configured headless
//! Chromium through Quora profile and question pages, extracts structured
//! signals in two passes, and writes canonical lead records as JSON.
//!
//! ## Features
//!
//! - One stealth browser session per run (randomized user agent and
//!   viewport, fixed locale, `navigator.webdriver` hidden)
//! - Navigation with bounded retries, exponential backoff on timeouts and
//!   randomized pacing between pages
//! - Metadata pass over head tags and anchors; visible-text pass over the
//!   rendered, scrolled and expanded DOM
//! - Field-wise merge of both passes and alias-driven mapping onto a
//!   nested output schema
//!
//! ## Usage
//!
//! ```sh
//! quora_leads https://www.quora.com/profile/Adam-D-Angelo -j leads.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: launch Chromium and open one stealth tab
//! 2. **Metadata pass**: visit every URL, read meta tags, links and contacts
//! 3. **Visible-text pass**: revisit every URL, read the rendered content
//! 4. **Merge + map**: fold both passes per URL, project onto the schema
//! 5. **Output**: write the records to a JSON file

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod browser;
mod cli;
mod config;
mod errors;
mod merge;
mod models;
mod navigator;
mod outputs;
mod pipeline;
mod schema;
mod scrapers;
#[cfg(test)]
mod testing;
mod utils;

use cli::{parse_url_list, Cli};
use config::PipelineConfig;
use outputs::json;
use pipeline::Pipeline;
use schema::SchemaMapper;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("quora_leads starting up");

    let args = Cli::parse();
    debug!(?args.urls_file, ?args.json_output, headed = args.headed, "Parsed CLI arguments");

    // ---- Config ----
    let mut config = PipelineConfig::load(args.config.as_deref()).await?;
    if let Some(path) = args.chrome_path.clone() {
        config.browser.chrome_executable = Some(path);
    }

    let mapper = match &config.schema_template {
        Some(path) => SchemaMapper::load(path, &config.platform.name).await?,
        None => SchemaMapper::embedded(&config.platform.name)?,
    };

    // ---- Gather URLs ----
    let mut urls = args.urls.clone();
    if let Some(path) = &args.urls_file {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => urls.extend(parse_url_list(&raw)),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read URL file");
                return Err(e.into());
            }
        }
    }
    if urls.is_empty() {
        warn!("No URLs given; nothing to do");
        return Ok(());
    }
    info!(count = urls.len(), "URLs queued");

    // ---- Scrape ----
    let pipeline = Pipeline::new(config, mapper);
    let records = match pipeline.run(&urls, !args.headed).await {
        Ok(records) => records,
        Err(e) => {
            error!(kind = e.kind(), fatal = e.is_fatal(), error = %e, "Pipeline aborted");
            return Err(e.into());
        }
    };

    // ---- Output ----
    let failed = records.iter().filter(|r| r.is_error()).count();
    let written = json::write_records(&records, &args.json_output).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        records = written,
        errors = failed,
        path = %args.json_output.display(),
        "Execution complete"
    );

    Ok(())
}
