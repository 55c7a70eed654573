//! Outcome reporter: folds attempt results into the final [`TransferOutcome`].

use std::fmt;

use tracing::{error, info};

use super::error::TransferError;
use super::executor::AttemptResult;

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The resource is complete in the sink.
    Success,
    /// Every allowed attempt failed recoverably.
    ExhaustedRetries,
    /// A failure that retrying cannot fix.
    FatalAbort,
    /// Stopped by an interrupt.
    Interrupted,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::ExhaustedRetries => "exhausted retries",
            Self::FatalAbort => "fatal abort",
            Self::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

/// Aggregate result of one run of the transfer controller.
#[derive(Debug)]
pub struct TransferOutcome {
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Final status.
    pub status: TransferStatus,
    /// Bytes in the sink when the run ended.
    pub total_bytes: u64,
    /// Why the run did not succeed; `None` on success and on interrupts.
    pub reason: Option<TransferError>,
}

impl TransferOutcome {
    /// Whether the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Accumulates attempt results for one run.
#[derive(Debug)]
pub struct OutcomeReporter {
    attempts: u32,
    total_bytes: u64,
}

impl OutcomeReporter {
    /// Starts a report for a sink that already holds `initial_bytes` usable bytes.
    #[must_use]
    pub fn start(initial_bytes: u64) -> Self {
        Self {
            attempts: 0,
            total_bytes: initial_bytes,
        }
    }

    /// Attempts recorded so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sink length as tracked so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Records one attempt and logs a progress line.
    ///
    /// An attempt that started below the tracked length means the server
    /// restarted the body, so the running total restarts with it.
    pub fn record_attempt(&mut self, result: &AttemptResult) {
        self.attempts += 1;
        if result.start_offset != self.total_bytes {
            self.total_bytes = result.start_offset;
        }
        self.total_bytes = self.total_bytes.saturating_add(result.bytes_transferred);

        info!(
            attempt = self.attempts,
            status = ?result.http_status,
            bytes = result.bytes_transferred,
            start_offset = result.start_offset,
            total_bytes = self.total_bytes,
            ok = result.is_success(),
            "attempt {} finished",
            self.attempts
        );
    }

    /// Records an attempt cut short by an interrupt; `sink_bytes` is the
    /// sink length measured afterwards.
    pub fn record_interrupted(&mut self, sink_bytes: u64) {
        self.attempts += 1;
        self.total_bytes = sink_bytes;
        info!(
            attempt = self.attempts,
            total_bytes = self.total_bytes,
            "attempt {} interrupted",
            self.attempts
        );
    }

    /// Builds the final outcome, logging one terminating line on failure.
    #[must_use]
    pub fn finish(self, status: TransferStatus, reason: Option<TransferError>) -> TransferOutcome {
        match (&status, &reason) {
            (TransferStatus::Success, _) => info!(
                attempts = self.attempts,
                total_bytes = self.total_bytes,
                "transfer complete"
            ),
            (TransferStatus::Interrupted, _) => error!(
                attempts = self.attempts,
                total_bytes = self.total_bytes,
                "transfer interrupted"
            ),
            (_, Some(reason)) => error!(
                attempts = self.attempts,
                total_bytes = self.total_bytes,
                "transfer failed ({status}): {reason}"
            ),
            (_, None) => error!(
                attempts = self.attempts,
                total_bytes = self.total_bytes,
                "transfer failed ({status})"
            ),
        }

        TransferOutcome {
            attempts: self.attempts,
            status,
            total_bytes: self.total_bytes,
            reason,
        }
    }
}
