//! Retry scheduler: drives the executor until success, exhaustion, a fatal
//! failure or an interrupt.
//!
//! ```text
//! Idle -> Attempting -> Deciding -> Succeeded
//!             ^             |
//!             +-- backoff --+-> GaveUp
//! ```
//!
//! Every retry re-probes the sink with resume forced on, because whatever it
//! holds at that point was written by this run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::TransferError;
use super::executor::{AttemptOutcome, AttemptResult, execute_attempt};
use super::outcome::{OutcomeReporter, TransferOutcome, TransferStatus};
use super::probe::{ResumeState, probe_resume_state};
use super::request::TransferRequest;
use super::retry::{BackoffStrategy, FailureType, RetryDecision, RetryPolicy, retry_after_hint};
use super::sink::Sink;

/// How often a pending wait checks the interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
enum SchedulerState {
    Idle,
    Attempting {
        attempt: u32,
        resume: ResumeState,
    },
    Deciding {
        attempt: u32,
        result: AttemptResult,
    },
    Succeeded,
    GaveUp {
        status: TransferStatus,
        reason: Option<TransferError>,
    },
}

/// Runs one transfer with retries.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
/// use wurl_core::transfer::{RetryPolicy, TransferController, TransferRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = TransferRequest::builder("https://example.com/f.bin")
///     .resume(true)
///     .build()?;
/// let interrupt = Arc::new(AtomicBool::new(false));
/// let outcome = TransferController::new(request)?
///     .with_retry_policy(RetryPolicy::from_budget(3))
///     .with_interrupt(interrupt)
///     .run()
///     .await;
/// println!("{} after {} attempts", outcome.status, outcome.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TransferController {
    request: TransferRequest,
    client: HttpClient,
    policy: RetryPolicy,
    interrupt: Arc<AtomicBool>,
}

impl TransferController {
    /// Builds the HTTP client for `request`; the retry budget comes from the request.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientBuild`] if the client cannot be built.
    pub fn new(request: TransferRequest) -> Result<Self, TransferError> {
        let client = HttpClient::from_request(&request)?;
        Ok(Self::with_client(request, client))
    }

    /// Uses an already-built client.
    #[must_use]
    pub fn with_client(request: TransferRequest, client: HttpClient) -> Self {
        let policy = RetryPolicy::from_budget(request.retry_budget());
        Self {
            request,
            client,
            policy,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `interrupt` as the cancellation flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Drives attempts until the transfer ends.
    #[instrument(skip(self), fields(url = %self.request.url(), sink = %self.request.sink()))]
    pub async fn run(&self) -> TransferOutcome {
        if let BackoffStrategy::Exponential { base, max } = self.policy.backoff() {
            info!(
                base_ms = base.as_millis(),
                max_ms = max.as_millis(),
                "retries use exponential backoff with jitter instead of a fixed 1s delay"
            );
        }

        let initial = match probe_resume_state(self.request.sink(), self.request.resume()).await {
            Ok(state) => state,
            Err(e) => {
                return OutcomeReporter::start(0).finish(TransferStatus::FatalAbort, Some(e));
            }
        };
        if initial.is_resuming() {
            info!(offset = initial.requested_offset, "continuing partial output");
        }

        let mut reporter = OutcomeReporter::start(initial.requested_offset);
        let mut state = SchedulerState::Idle;

        loop {
            state = match state {
                SchedulerState::Idle => SchedulerState::Attempting {
                    attempt: 1,
                    resume: initial,
                },
                SchedulerState::Attempting { attempt, resume } => {
                    self.attempt(&mut reporter, attempt, resume).await
                }
                SchedulerState::Deciding { attempt, result } => self.decide(attempt, result).await,
                SchedulerState::Succeeded => {
                    return reporter.finish(TransferStatus::Success, None);
                }
                SchedulerState::GaveUp { status, reason } => {
                    return reporter.finish(status, reason);
                }
            };
        }
    }

    async fn attempt(
        &self,
        reporter: &mut OutcomeReporter,
        attempt: u32,
        resume: ResumeState,
    ) -> SchedulerState {
        if self.is_interrupted() {
            return interrupted();
        }

        info!(attempt, offset = resume.requested_offset, "starting attempt");
        tokio::select! {
            biased;
            () = wait_for_interrupt(&self.interrupt) => {
                let sink_bytes = measure_sink(self.request.sink())
                    .await
                    .unwrap_or(reporter.total_bytes());
                reporter.record_interrupted(sink_bytes);
                interrupted()
            }
            result = execute_attempt(&self.client, &self.request, resume) => {
                reporter.record_attempt(&result);
                SchedulerState::Deciding { attempt, result }
            }
        }
    }

    async fn decide(&self, attempt: u32, result: AttemptResult) -> SchedulerState {
        let reason = match result.outcome {
            AttemptOutcome::Success => return SchedulerState::Succeeded,
            AttemptOutcome::FatalFailure { reason } => {
                return SchedulerState::GaveUp {
                    status: TransferStatus::FatalAbort,
                    reason: Some(reason),
                };
            }
            AttemptOutcome::RecoverableFailure { reason } => reason,
        };

        let (delay, next_attempt) = match self.policy.should_retry(FailureType::Recoverable, attempt)
        {
            RetryDecision::Retry { delay, attempt } => (delay, attempt),
            RetryDecision::DoNotRetry { reason: why } => {
                debug!(reason = %why, "giving up");
                return SchedulerState::GaveUp {
                    status: TransferStatus::ExhaustedRetries,
                    reason: Some(reason),
                };
            }
        };

        let delay = retry_after_hint(&reason).map_or(delay, |hint| {
            debug!(hint_ms = hint.as_millis(), "using server Retry-After");
            hint
        });
        warn!(
            delay_ms = delay.as_millis(),
            "retrying {attempt}/{} after failure: {reason}",
            self.policy.budget_label()
        );

        if !self.sleep_unless_interrupted(delay).await {
            return interrupted();
        }

        match probe_resume_state(self.request.sink(), true).await {
            Ok(resume) => SchedulerState::Attempting {
                attempt: next_attempt,
                resume,
            },
            Err(e) => SchedulerState::GaveUp {
                status: TransferStatus::FatalAbort,
                reason: Some(e),
            },
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Returns `false` if the interrupt fired before `delay` elapsed.
    async fn sleep_unless_interrupted(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = wait_for_interrupt(&self.interrupt) => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

fn interrupted() -> SchedulerState {
    SchedulerState::GaveUp {
        status: TransferStatus::Interrupted,
        reason: None,
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

async fn measure_sink(sink: &Sink) -> Option<u64> {
    let path = sink.path()?;
    tokio::fs::metadata(path).await.ok().map(|meta| meta.len())
}

/// Runs `request` to completion with the retry policy derived from it.
///
/// An HTTP client that cannot be built ends the run as a fatal abort with zero
/// attempts.
pub async fn run_transfer(request: TransferRequest) -> TransferOutcome {
    match TransferController::new(request) {
        Ok(controller) => controller.run().await,
        Err(e) => OutcomeReporter::start(0).finish(TransferStatus::FatalAbort, Some(e)),
    }
}
