//! Wait mechanisms
//!
//! Every wait on the page is bounded. A poll loop re-evaluates a condition until it holds
//! or the timeout expires, then fails with [`QuoteflowError::Timeout`]. Query errors while
//! polling count as "not yet", except fatal ones which end the wait immediately.

use crate::driver::UiDriver;
use crate::locator::Selector;
use crate::result::{QuoteflowError, QuoteflowResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element waits (20 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
    /// Number of condition checks
    pub polls: u32,
}

// =============================================================================
// WAITER
// =============================================================================

/// Bounded waits against a driver
#[derive(Clone, Copy)]
pub struct Waiter<'a> {
    driver: &'a dyn UiDriver,
    options: WaitOptions,
}

impl std::fmt::Debug for Waiter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Waiter<'a> {
    /// Create a waiter with the given options
    #[must_use]
    pub const fn new(driver: &'a dyn UiDriver, options: WaitOptions) -> Self {
        Self { driver, options }
    }

    /// Poll `condition` until it yields true
    pub async fn wait_for<F, Fut>(
        &self,
        waited_for: impl Into<String>,
        mut condition: F,
    ) -> QuoteflowResult<WaitResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = QuoteflowResult<bool>>,
    {
        let waited_for = waited_for.into();
        let start = Instant::now();
        let deadline = start + self.options.timeout();
        let mut polls = 0_u32;
        loop {
            polls += 1;
            match condition().await {
                Ok(true) => {
                    return Ok(WaitResult {
                        elapsed: start.elapsed(),
                        waited_for,
                        polls,
                    })
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::trace!(error = %e, "{waited_for}: not yet"),
            }
            if Instant::now() >= deadline {
                return Err(QuoteflowError::Timeout {
                    ms: self.options.timeout_ms,
                    waited_for,
                });
            }
            tokio::time::sleep(self.options.poll_interval()).await;
        }
    }

    /// Wait until an element matching `selector` exists
    pub async fn present(&self, selector: &Selector) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} to be present"), || {
            driver.is_present(selector)
        })
        .await
    }

    /// Wait until the first match is visible
    pub async fn visible(&self, selector: &Selector) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} to be visible"), || {
            driver.is_visible(selector)
        })
        .await
    }

    /// Wait until the first match is visible and enabled
    pub async fn clickable(&self, selector: &Selector) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} to be clickable"), || {
            driver.is_clickable(selector)
        })
        .await
    }

    /// Wait until nothing matching `selector` is visible
    pub async fn gone(&self, selector: &Selector) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} to disappear"), || async move {
            Ok(!driver.is_visible(selector).await?)
        })
        .await
    }

    /// Wait until the first match's text contains `needle`
    pub async fn text_contains(
        &self,
        selector: &Selector,
        needle: &str,
    ) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} text to contain '{needle}'"), || async move {
            Ok(driver
                .text(selector)
                .await?
                .is_some_and(|t| t.contains(needle)))
        })
        .await
    }

    /// Wait until the first match carries CSS class `class`
    pub async fn has_class(&self, selector: &Selector, class: &str) -> QuoteflowResult<WaitResult> {
        let driver = self.driver;
        self.wait_for(format!("{selector} to have class '{class}'"), || async move {
            Ok(driver
                .attribute(selector, "class")
                .await?
                .is_some_and(|v| v.split_whitespace().any(|c| c == class)))
        })
        .await
    }
}

/// Fixed pause for page work that exposes no observable completion signal
pub async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

// =============================================================================
// TESTS
// =============================================================================
