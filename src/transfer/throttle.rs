//! Byte-rate pacing for streamed writes.
//!
//! The [`Throttle`] is consulted after every chunk written to the sink. It
//! compares the bytes written so far with the time the configured rate allows
//! for them and sleeps off any lead, so the running average never exceeds the
//! ceiling by more than the chunk that was just written.
//!
//! # Example
//!
//! ```
//! use wurl_core::transfer::parse_rate;
//!
//! assert_eq!(parse_rate("200K").unwrap(), 200 * 1024);
//! assert_eq!(parse_rate("1m").unwrap(), 1024 * 1024);
//! assert_eq!(parse_rate("512").unwrap(), 512);
//! assert!(parse_rate("fast").is_err());
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::error::RequestError;

/// Parses a rate string: a byte count with an optional `K` or `M` suffix
/// (binary multiples, case-insensitive).
///
/// # Errors
///
/// Returns [`RequestError::InvalidRate`] for anything else, including overflow.
pub fn parse_rate(value: &str) -> Result<u64, RequestError> {
    let invalid = || RequestError::InvalidRate {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&trimmed[..idx], 1024),
        Some((idx, 'm' | 'M')) => (&trimmed[..idx], 1024 * 1024),
        Some(_) => (trimmed, 1),
        None => return Err(invalid()),
    };

    let count: u64 = digits.trim().parse().map_err(|_| invalid())?;
    count.checked_mul(multiplier).ok_or_else(invalid)
}

/// Paces a byte stream to a maximum average rate.
#[derive(Debug)]
pub struct Throttle {
    bytes_per_sec: u64,
    started: Instant,
    bytes: u64,
}

impl Throttle {
    /// Creates a throttle whose clock starts now.
    ///
    /// A zero rate is treated as one byte per second rather than dividing by zero;
    /// callers express "unlimited" by not creating a throttle.
    #[must_use]
    pub fn new(bytes_per_sec: u64) -> Self {
        Self {
            bytes_per_sec: bytes_per_sec.max(1),
            started: Instant::now(),
            bytes: 0,
        }
    }

    /// Accounts for `len` freshly written bytes and sleeps until the running
    /// average is back under the ceiling.
    pub async fn pace(&mut self, len: usize) {
        self.bytes = self.bytes.saturating_add(len as u64);
        let delay = self.lead();
        if !delay.is_zero() {
            trace!(
                bytes = self.bytes,
                delay_ms = delay.as_millis(),
                "pacing to rate limit"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// How far ahead of the allowed schedule the stream currently is.
    fn lead(&self) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let allowed = Duration::from_secs_f64(self.bytes as f64 / self.bytes_per_sec as f64);
        allowed.saturating_sub(self.started.elapsed())
    }
}
