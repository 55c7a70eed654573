//! Resilient single-URL transfer: resume, retries with backoff, rate pacing.
//!
//! A run starts from a validated [`TransferRequest`]. The Range Prober
//! ([`probe_resume_state`]) decides where the sink continues, the executor
//! ([`execute_attempt`]) performs one streamed HTTP attempt, the
//! [`TransferController`] schedules retries under a [`RetryPolicy`], and the
//! [`OutcomeReporter`] folds everything into a [`TransferOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use wurl_core::transfer::{Sink, TransferRequest, run_transfer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = TransferRequest::builder("https://example.com/release.tar.gz")
//!     .sink(Sink::from_arg("release.tar.gz"))
//!     .resume(true)
//!     .retry_budget(5)
//!     .build()?;
//! let outcome = run_transfer(request).await;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

mod client;
mod controller;
mod error;
mod executor;
mod outcome;
mod probe;
mod request;
mod retry;
mod sink;
mod throttle;

pub use client::HttpClient;
pub use controller::{TransferController, run_transfer};
pub use error::{RequestError, TransferError};
pub use executor::{AttemptOutcome, AttemptResult, execute_attempt};
pub use outcome::{OutcomeReporter, TransferOutcome, TransferStatus};
pub use probe::{ResumeState, SinkWriter, open_sink, probe_resume_state};
pub use request::{
    Credentials, DEFAULT_RETRY_BUDGET, IpFamily, ProxySetting, Timeouts, TransferRequest,
    TransferRequestBuilder,
};
pub use retry::{
    BackoffStrategy, FailureType, RetryDecision, RetryPolicy, classify_error, parse_retry_after,
    retry_after_hint,
};
pub use sink::{DEFAULT_OUTPUT_FILENAME, Sink, default_filename};
pub use throttle::{Throttle, parse_rate};
