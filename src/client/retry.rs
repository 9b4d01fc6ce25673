//! Retry policy for idempotent background requests.
//!
//! Applies only to prefetch and poll GETs; navigation visits are never
//! replayed automatically. Backoff grows linearly by one second per
//! attempt, capped, and a server-supplied `Retry-After` takes precedence
//! when enabled.

use std::time::Duration;

/// Configuration for retry behavior.
///
/// # Example
///
/// ```
/// use glide_rs::client::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default()
///     .with_max_retries(3)
///     .with_initial_backoff(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,

    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,

    /// Maximum backoff duration (caps the linear growth).
    pub max_backoff: Duration,

    /// HTTP status codes that trigger a retry.
    pub retry_on_status: Vec<u16>,

    /// Whether to respect the `Retry-After` header from the server.
    pub respect_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3),
            retry_on_status: vec![
                408, // Request Timeout
                429, // Too Many Requests
                502, // Bad Gateway
                503, // Service Unavailable
                504, // Gateway Timeout
            ],
            respect_retry_after: true,
        }
    }
}

impl RetryConfig {
    /// Default retry settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that disables retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the initial backoff duration.
    #[must_use]
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set the maximum backoff duration.
    #[must_use]
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Add a status code that should trigger a retry.
    #[must_use]
    pub fn with_retry_on_status(mut self, status: u16) -> Self {
        if !self.retry_on_status.contains(&status) {
            self.retry_on_status.push(status);
        }
        self
    }
}

/// Result of a retry decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Wait for the duration, then retry.
    Retry(Duration),
    /// Give up.
    DontRetry,
}

/// Retry state tracking for one request.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: u32,
    current_backoff: Duration,
    config: RetryConfig,
}

impl RetryState {
    /// Create a fresh state with the given config.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            attempts: 0,
            current_backoff: config.initial_backoff,
            config,
        }
    }

    /// Decide based on a transport error. Aborts never retry.
    pub fn should_retry_error(&mut self, is_abort: bool) -> RetryDecision {
        if is_abort {
            return RetryDecision::DontRetry;
        }
        self.decide(None)
    }

    /// Decide based on an HTTP status code, honoring `Retry-After` when
    /// supplied.
    pub fn should_retry_status(
        &mut self,
        status: u16,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if !self.config.retry_on_status.contains(&status) {
            return RetryDecision::DontRetry;
        }
        self.decide(retry_after)
    }

    fn decide(&mut self, retry_after: Option<Duration>) -> RetryDecision {
        self.attempts += 1;
        if self.attempts > self.config.max_retries {
            return RetryDecision::DontRetry;
        }

        let wait = if self.config.respect_retry_after {
            retry_after.unwrap_or(self.current_backoff)
        } else {
            self.current_backoff
        };

        // Linear +1s growth, capped.
        self.current_backoff = std::cmp::min(
            self.current_backoff + Duration::from_secs(1),
            self.config.max_backoff,
        );

        RetryDecision::Retry(wait)
    }

    /// Reset after a successful request.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_backoff = self.config.initial_backoff;
    }
}

/// Parse a `Retry-After` header value in delay-seconds format.
///
/// HTTP-date format is not supported and yields `None`.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
