//! Retryable actions.
//!
//! An action is attempted up to `max_attempts` times. Each attempt first runs a
//! precondition (typically "no blocking overlay is visible"), then the action, both bounded
//! by their own waits. Exhaustion is not an error: the caller gets [`Attempted::Exhausted`]
//! and decides whether to skip or abort. Fatal errors end the loop at once.

use crate::context::{EventCategory, EventLevel, RunContext, RunEvent};
use crate::result::QuoteflowResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Pause after the first failed attempt
    pub delay_ms: u64,
    /// Factor applied to the pause after each further failure
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1_000,
            backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and the default pause
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the pause in milliseconds
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the backoff factor
    #[must_use]
    pub const fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff;
        self
    }

    /// Pause after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff.max(1.0).powi(exponent);
        Duration::from_millis(self.delay_ms).mul_f64(factor.min(1_000.0))
    }
}

/// Outcome of a retried action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempted<T> {
    /// The action succeeded
    Done {
        /// Value returned by the action
        value: T,
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure
        last_error: String,
    },
}

impl<T> Attempted<T> {
    /// Whether the action succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Attempts made
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Done { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Value of a successful action
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Done { value, .. } => Some(value),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Runs actions under a [`RetryPolicy`]
#[derive(Debug, Clone, Copy)]
pub struct RetryableAction {
    policy: RetryPolicy,
}

impl RetryableAction {
    /// Create with a policy
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Policy in use
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempt `action` after `pre_check` until it succeeds or attempts run out
    ///
    /// # Errors
    ///
    /// Only fatal errors (see [`crate::QuoteflowError::is_fatal`]) are returned; every other
    /// failure is counted as a failed attempt.
    pub async fn run<T, P, PF, A, AF>(
        &self,
        ctx: &RunContext,
        label: &str,
        mut pre_check: P,
        mut action: A,
    ) -> QuoteflowResult<Attempted<T>>
    where
        P: FnMut() -> PF,
        PF: Future<Output = QuoteflowResult<()>>,
        A: FnMut() -> AF,
        AF: Future<Output = QuoteflowResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            let result = match pre_check().await {
                Ok(()) => action().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => {
                    ctx.emit(
                        RunEvent::new(
                            EventLevel::Info,
                            EventCategory::Retry,
                            format!("{label} succeeded on attempt {attempt}"),
                        )
                        .with("attempt", attempt),
                    );
                    return Ok(Attempted::Done {
                        value,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    ctx.emit(
                        RunEvent::new(
                            EventLevel::Warn,
                            EventCategory::Retry,
                            format!("Attempt {attempt} to {label} failed: {e}"),
                        )
                        .with("attempt", attempt),
                    );
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }
        ctx.emit(
            RunEvent::new(
                EventLevel::Error,
                EventCategory::Retry,
                format!("Failed to {label} after {max_attempts} attempts"),
            )
            .with("last_error", last_error.clone()),
        );
        Ok(Attempted::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable)]
mod tests {
    use super::*;
    use crate::context::RecordingSink;
    use crate::result::QuoteflowError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick(max_attempts: u32) -> RetryableAction {
        RetryableAction::new(RetryPolicy::new(max_attempts).with_delay(1))
    }

    async fn fail_times(
        retry: RetryableAction,
        ctx: &RunContext,
        k: u32,
    ) -> (QuoteflowResult<Attempted<u32>>, u32) {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry
            .run(
                ctx,
                "click 'Standard' tab",
                || async { Ok(()) },
                || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= k {
                        Err(QuoteflowError::not_interactable("css=#normCfg", "overlay"))
                    } else {
                        Ok(n)
                    }
                },
            )
            .await;
        (result, counter.load(Ordering::SeqCst))
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_default_policy() {
            let policy = RetryPolicy::default();
            assert_eq!(policy.max_attempts, 3);
            assert_eq!(policy.delay_after(1), Duration::from_secs(1));
            assert_eq!(policy.delay_after(3), Duration::from_secs(1));
        }

        #[test]
        fn test_backoff_grows() {
            let policy = RetryPolicy::new(4).with_delay(100).with_backoff(2.0);
            assert_eq!(policy.delay_after(1), Duration::from_millis(100));
            assert_eq!(policy.delay_after(2), Duration::from_millis(200));
            assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_success_after_failures() {
            let recorder = Arc::new(RecordingSink::new());
            let ctx = RunContext::new(recorder.clone());
            let (result, calls) = fail_times(quick(3), &ctx, 2).await;
            let attempted = result.unwrap();
            assert!(attempted.is_success());
            assert_eq!(attempted.attempts(), 3);
            assert_eq!(calls, 3);
            assert_eq!(recorder.by_category(EventCategory::Retry).len(), 3);
        }

        #[tokio::test]
        async fn test_exhaustion_is_not_an_error() {
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let (result, calls) = fail_times(quick(3), &ctx, 10).await;
            match result.unwrap() {
                Attempted::Exhausted {
                    attempts,
                    last_error,
                } => {
                    assert_eq!(attempts, 3);
                    assert!(last_error.contains("overlay"));
                }
                Attempted::Done { .. } => unreachable!("action never succeeds"),
            }
            assert_eq!(calls, 3);
        }

        #[tokio::test]
        async fn test_fatal_error_propagates() {
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let counter = AtomicU32::new(0);
            let calls = &counter;
            let result: QuoteflowResult<Attempted<()>> = quick(3)
                .run(
                    &ctx,
                    "open edit dialog",
                    || async { Ok(()) },
                    || async move {
                        let _ = calls.fetch_add(1, Ordering::SeqCst);
                        Err(QuoteflowError::SessionClosed {
                            message: "gone".to_string(),
                        })
                    },
                )
                .await;
            assert!(result.unwrap_err().is_fatal());
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_pre_check_failure_counts_as_attempt() {
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let checks = AtomicU32::new(0);
            let checks_ref = &checks;
            let actions = AtomicU32::new(0);
            let actions_ref = &actions;
            let attempted = quick(3)
                .run(
                    &ctx,
                    "click 'Parts' tab",
                    || async move {
                        if checks_ref.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(QuoteflowError::Timeout {
                                ms: 5,
                                waited_for: "overlay to disappear".to_string(),
                            })
                        } else {
                            Ok(())
                        }
                    },
                    || async move {
                        let _ = actions_ref.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                )
                .await
                .unwrap();
            assert_eq!(attempted.attempts(), 2);
            assert_eq!(actions.load(Ordering::SeqCst), 1);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_k_failures_take_k_plus_one_attempts(max in 1u32..6, k in 0u32..6) {
            prop_assume!(k < max);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("runtime");
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let (result, calls) = runtime.block_on(fail_times(quick(max), &ctx, k));
            let attempted = result.expect("no fatal error");
            prop_assert!(attempted.is_success());
            prop_assert_eq!(attempted.attempts(), k + 1);
            prop_assert_eq!(calls, k + 1);
        }
    }
}
