//! Page navigation with bounded retries and randomized pacing.
//!
//! # Retry Strategy
//!
//! - At most `max_retries` attempts in total
//! - Timeouts back off exponentially: `backoff_base * 2^attempt` (1s, 2s, ...)
//! - Any other failure pauses a fixed `error_pause` (2s) before the next attempt
//! - The last failure is always returned to the caller, classified
//!
//! After a successful navigation a random 2-4s pause is inserted so requests
//! do not arrive at a uniform cadence.

use crate::browser::PageDriver;
use crate::config::NavigationConfig;
use crate::errors::{BrowserError, ScrapeError};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone)]
pub struct ResilientNavigator {
    /// Total attempts before giving up.
    max_retries: u32,
    /// Per-attempt navigation timeout.
    timeout: Duration,
    /// Bounds of the randomized pause after a successful navigation.
    settle_min: Duration,
    settle_max: Duration,
    /// First timeout backoff, doubled on every further attempt.
    backoff_base: Duration,
    /// Pause after a non-timeout failure.
    error_pause: Duration,
}

impl Default for ResilientNavigator {
    fn default() -> Self {
        Self::from_config(&NavigationConfig::default())
    }
}

impl ResilientNavigator {
    pub fn from_config(config: &NavigationConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            timeout: config.timeout(),
            settle_min: Duration::from_millis(config.settle_min_ms),
            settle_max: Duration::from_millis(config.settle_max_ms.max(config.settle_min_ms)),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            error_pause: Duration::from_millis(config.error_pause_ms),
        }
    }

    /// Delay before the attempt following a timeout on `attempt` (0-based).
    pub fn timeout_backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }

    fn settle_pause(&self) -> Duration {
        if self.settle_max <= self.settle_min {
            return self.settle_min;
        }
        rand::rng().random_range(self.settle_min..=self.settle_max)
    }

    /// Navigate `page` to `url`, retrying per the strategy above.
    ///
    /// # Arguments
    ///
    /// * `page` - The shared tab; only one navigation is in flight at a time
    /// * `url` - Absolute page URL
    ///
    /// # Returns
    ///
    /// `Ok(())` once the document has loaded and the settle pause has elapsed.
    ///
    /// # Errors
    ///
    /// After the last attempt the failure is returned as
    /// [`ScrapeError::NavigationTimeout`] or [`ScrapeError::Navigation`],
    /// carrying the attempt count and the underlying browser error.
    #[instrument(level = "info", skip(self, page))]
    pub async fn navigate<P: PageDriver>(&self, page: &P, url: &str) -> Result<(), ScrapeError> {
        let total_t0 = Instant::now();

        let mut attempt = 0u32;
        loop {
            let attempt_t0 = Instant::now();
            let err = match page.goto(url, self.timeout).await {
                Ok(()) => {
                    let pause = self.settle_pause();
                    debug!(
                        attempt = attempt + 1,
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        pause_ms = pause.as_millis() as u64,
                        "Navigation succeeded"
                    );
                    sleep(pause).await;
                    return Ok(());
                }
                Err(e) => e,
            };

            if attempt + 1 >= self.max_retries {
                error!(
                    attempt = attempt + 1,
                    max = self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "Navigation exhausted retries"
                );
                return Err(classify(url, attempt + 1, err));
            }

            let delay = if err.is_timeout() {
                self.timeout_backoff(attempt)
            } else {
                self.error_pause
            };
            warn!(
                attempt = attempt + 1,
                max = self.max_retries,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %err,
                "Navigation attempt failed; backing off"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

fn classify(url: &str, attempts: u32, source: BrowserError) -> ScrapeError {
    if source.is_timeout() {
        ScrapeError::NavigationTimeout {
            url: url.to_string(),
            attempts,
            source,
        }
    } else {
        ScrapeError::Navigation {
            url: url.to_string(),
            attempts,
            source,
        }
    }
}
