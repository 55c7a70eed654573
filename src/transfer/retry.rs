//! Retry decisions and backoff for failed transfer attempts.
//!
//! A failed attempt's [`TransferError`] is classified by [`classify_error`]
//! into a [`FailureType`]. The [`RetryPolicy`] then decides, from the failure
//! type and the attempt number, whether another attempt is allowed and how
//! long to wait before it.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wurl_core::transfer::{
//!     BackoffStrategy, RetryDecision, RetryPolicy, TransferError, classify_error,
//! };
//!
//! let policy = RetryPolicy::from_budget(3)
//!     .with_backoff(BackoffStrategy::Fixed(Duration::from_secs(1)));
//! let error = TransferError::http_status("https://example.com/f.bin", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(1));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::error::TransferError;

/// Base delay of the exponential strategy.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap of the exponential strategy, before jitter.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay of the fixed strategy.
pub const FIXED_DELAY: Duration = Duration::from_secs(1);

/// Maximum jitter added to exponential delays.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Upper bound honoured for a server-supplied Retry-After.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Transient: network trouble, timeouts, 408/429/5xx, a truncated body.
    Recoverable,
    /// Retrying cannot help: bad URL, most 4xx, local IO, TLS, range mismatch.
    Fatal,
}

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `min(base * 2^(attempt-1), max)` plus up to 500ms of jitter.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Cap before jitter.
        max: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: DEFAULT_BASE_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffStrategy {
    /// The fixed one-second cadence.
    #[must_use]
    pub fn fixed() -> Self {
        Self::Fixed(FIXED_DELAY)
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Number of the attempt that will be made (first retry is 2).
        attempt: u32,
    },

    /// Stop.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry budget plus backoff strategy.
///
/// The budget counts additional attempts after the first, so a budget of `n`
/// allows `n + 1` attempts in total. A budget of 0 means unlimited.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: Option<u32>,
    backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_budget(super::request::DEFAULT_RETRY_BUDGET)
    }
}

impl RetryPolicy {
    /// Creates a policy from a retry budget (0 = unlimited) with exponential backoff.
    #[must_use]
    pub fn from_budget(budget: u32) -> Self {
        Self {
            max_retries: (budget > 0).then_some(budget),
            backoff: BackoffStrategy::default(),
        }
    }

    /// Replaces the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Additional attempts allowed after the first; `None` when unlimited.
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// The configured strategy.
    #[must_use]
    pub fn backoff(&self) -> BackoffStrategy {
        self.backoff
    }

    /// Budget as printed in retry lines: the number, or `inf`.
    #[must_use]
    pub fn budget_label(&self) -> String {
        self.max_retries
            .map_or_else(|| "inf".to_string(), |max| max.to_string())
    }

    /// Decides whether to retry after attempt number `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_retries = ?self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Fatal {
            return RetryDecision::DoNotRetry {
                reason: "fatal failure - retry would not help".to_string(),
            };
        }

        if let Some(max) = self.max_retries
            && attempt > max
        {
            debug!(attempt, max, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({max}) exhausted"),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt.saturating_add(1),
        }
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed(delay) => delay,
            BackoffStrategy::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let scaled = base.saturating_mul(1u32 << exponent);
                scaled.min(max) + self.calculate_jitter()
            }
        }
    }

    #[allow(clippy::unused_self)]
    fn calculate_jitter(&self) -> Duration {
        let mut rng = rand::thread_rng();
        #[allow(clippy::cast_possible_truncation)]
        let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies an attempt error for the retry decision.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, Network (non-TLS), IncompleteBody | Recoverable |
/// | HTTP 408, 429, 5xx | Recoverable |
/// | other HTTP statuses, AuthRequired | Fatal |
/// | Network (certificate, redirect loop) | Fatal |
/// | Io, InvalidUrl, UnsupportedScheme, RangeMismatch, RedirectOnResume | Fatal |
/// | ClientBuild, StreamNotResumable | Fatal |
#[must_use]
pub fn classify_error(error: &TransferError) -> FailureType {
    match error {
        TransferError::HttpStatus { status, .. } => classify_http_status(*status),

        TransferError::Timeout { .. } | TransferError::IncompleteBody { .. } => {
            FailureType::Recoverable
        }

        TransferError::Network { source, .. } => {
            if source.is_redirect() || is_certificate_error(source) {
                FailureType::Fatal
            } else {
                FailureType::Recoverable
            }
        }

        TransferError::AuthRequired { .. }
        | TransferError::Io { .. }
        | TransferError::InvalidUrl { .. }
        | TransferError::UnsupportedScheme { .. }
        | TransferError::RangeMismatch { .. }
        | TransferError::RedirectOnResume { .. }
        | TransferError::ClientBuild { .. }
        | TransferError::StreamNotResumable { .. } => FailureType::Fatal,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Recoverable, // Request Timeout
        429 => FailureType::Recoverable, // Too Many Requests
        500..=599 => FailureType::Recoverable,
        _ => FailureType::Fatal,
    }
}

/// Certificate rejection happens while connecting and every TLS backend names
/// the certificate in its message. Other handshake failures (a peer closing
/// mid-handshake) stay recoverable.
fn is_certificate_error(error: &reqwest::Error) -> bool {
    if !error.is_connect() {
        return false;
    }
    let mut current: Option<&dyn std::error::Error> = Some(error);
    while let Some(err) = current {
        if err.to_string().to_lowercase().contains("certificate") {
            return true;
        }
        current = err.source();
    }
    false
}

/// Parses a Retry-After header value (integer seconds or HTTP-date).
///
/// Values above one hour are capped; dates in the past yield zero.
///
/// ```
/// use std::time::Duration;
/// use wurl_core::transfer::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) if duration > MAX_RETRY_AFTER => {
            warn!(
                delay_secs = duration.as_secs(),
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "Retry-After date exceeds maximum, capping at 1 hour"
            );
            Some(MAX_RETRY_AFTER)
        }
        Ok(duration) => Some(duration),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    }
}

/// Server-requested delay carried by an error, if any.
#[must_use]
pub fn retry_after_hint(error: &TransferError) -> Option<Duration> {
    match error {
        TransferError::HttpStatus {
            status: 429 | 503,
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}
