//! Runtime configuration for the scraper.
//!
//! All settings have defaults matching the live Quora site, so the
//! configuration file is optional and may be partial:
//!
//! ```yaml
//! navigation:
//!   max_retries: 5
//!   timeout_ms: 45000
//! visible_text:
//!   scroll_rounds: 8
//! browser:
//!   chrome_executable: /usr/bin/chromium
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub platform: PlatformConfig,
    pub navigation: NavigationConfig,
    pub visible_text: VisibleTextConfig,
    pub browser: LaunchConfig,
    /// JSON file replacing the embedded canonical schema template.
    pub schema_template: Option<PathBuf>,
}

/// The site being scraped and how its own links are recognised.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Value forced into `platform` and `source` on every output record.
    pub name: String,
    /// Origin used to absolutise scheme-less internal links.
    pub origin: String,
    /// Hosts containing this are internal to the platform.
    pub domain: String,
    /// Substrings that disqualify an href from the external link list.
    pub excluded_link_domains: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: "quora".to_string(),
            origin: "https://www.quora.com".to_string(),
            domain: "quora.com".to_string(),
            excluded_link_domains: vec!["quora.com".to_string(), "quorablog.quora.com".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,
    pub backoff_base_ms: u64,
    pub error_pause_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 30_000,
            settle_min_ms: 2_000,
            settle_max_ms: 4_000,
            backoff_base_ms: 1_000,
            error_pause_ms: 2_000,
        }
    }
}

impl NavigationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisibleTextConfig {
    pub content_wait_ms: u64,
    pub dialog_wait_ms: u64,
    pub scroll_rounds: u32,
    pub scroll_settle_ms: u64,
    pub expand_rounds: u32,
    pub expand_settle_ms: u64,
}

impl Default for VisibleTextConfig {
    fn default() -> Self {
        Self {
            content_wait_ms: 20_000,
            dialog_wait_ms: 5_000,
            scroll_rounds: 5,
            scroll_settle_ms: 1_000,
            expand_rounds: 10,
            expand_settle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Chromium binary; chromiumoxide's own lookup is used when unset.
    pub chrome_executable: Option<PathBuf>,
    /// Extra command-line switches appended after the hardening flags.
    pub extra_args: Vec<String>,
}

impl PipelineConfig {
    /// Load configuration from a YAML file, or defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: PipelineConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.to_string(),
                source,
            })?;
        config.validate()?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let nav = &self.navigation;
        if nav.settle_min_ms > nav.settle_max_ms {
            return Err(ConfigError::Invalid(format!(
                "navigation.settle_min_ms ({}) exceeds settle_max_ms ({})",
                nav.settle_min_ms, nav.settle_max_ms
            )));
        }
        if url::Url::parse(&self.platform.origin).is_err() {
            return Err(ConfigError::Invalid(format!(
                "platform.origin is not an absolute URL: {}",
                self.platform.origin
            )));
        }
        Ok(())
    }
}
