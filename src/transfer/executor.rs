//! Transfer executor: exactly one HTTP request/response cycle.
//!
//! [`execute_attempt`] sends the request (with a `Range` header when the
//! prober found bytes to continue from), validates the response, streams the
//! body into the sink chunk by chunk and reports an [`AttemptResult`]. It never
//! returns an error and never panics on network conditions: every failure is
//! classified into the result so the controller can decide what happens next.

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, LOCATION, RETRY_AFTER};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::error::TransferError;
use super::probe::{ResumeState, open_sink};
use super::request::TransferRequest;
use super::retry::{FailureType, classify_error};
use super::throttle::Throttle;

/// How one attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The resource is complete in the sink.
    Success,
    /// Transient failure; another attempt may succeed.
    RecoverableFailure {
        /// What went wrong.
        reason: TransferError,
    },
    /// Retrying cannot help.
    FatalFailure {
        /// What went wrong.
        reason: TransferError,
    },
}

/// Report produced by one executor invocation.
#[derive(Debug)]
pub struct AttemptResult {
    /// Outcome tag.
    pub outcome: AttemptOutcome,
    /// Bytes written to the sink during this attempt.
    pub bytes_transferred: u64,
    /// Sink offset where this attempt's first byte landed.
    pub start_offset: u64,
    /// HTTP status of the response, when one arrived.
    pub http_status: Option<u16>,
}

impl AttemptResult {
    fn new(start_offset: u64) -> Self {
        Self {
            outcome: AttemptOutcome::Success,
            bytes_transferred: 0,
            start_offset,
            http_status: None,
        }
    }

    /// Whether the attempt completed the transfer.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success)
    }

    /// The failure reason, if the attempt failed.
    #[must_use]
    pub fn reason(&self) -> Option<&TransferError> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::RecoverableFailure { reason }
            | AttemptOutcome::FatalFailure { reason } => Some(reason),
        }
    }
}

/// Performs one transfer attempt starting at `resume.requested_offset`.
#[instrument(
    skip(client, request, resume),
    fields(url = %request.url(), offset = resume.requested_offset)
)]
pub async fn execute_attempt(
    client: &HttpClient,
    request: &TransferRequest,
    resume: ResumeState,
) -> AttemptResult {
    let mut result = AttemptResult::new(resume.requested_offset);

    if let Err(error) = run_attempt(client, request, resume, &mut result).await {
        result.outcome = classify_attempt_failure(request, error, result.bytes_transferred);
    }

    debug!(
        success = result.is_success(),
        bytes = result.bytes_transferred,
        start_offset = result.start_offset,
        status = ?result.http_status,
        "attempt finished"
    );
    result
}

async fn run_attempt(
    client: &HttpClient,
    request: &TransferRequest,
    resume: ResumeState,
    result: &mut AttemptResult,
) -> Result<(), TransferError> {
    validate_url(request.url())?;

    let offset = resume.requested_offset;
    let response = client.send(request, offset).await?;
    let status = response.status();
    result.http_status = Some(status.as_u16());

    if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
        info!(offset, "server reports nothing past the current length; already complete");
        return Ok(());
    }
    check_status(request.url(), &response)?;
    if status.is_redirection() && offset > 0 {
        return Err(redirect_on_resume(request.url(), &response));
    }

    let start_offset = resolve_start_offset(request.url(), &response, offset)?;
    if start_offset < offset {
        warn!(
            requested = offset,
            status = status.as_u16(),
            "server ignored the byte range; restarting from 0"
        );
    }
    result.start_offset = start_offset;

    let content_length = response.content_length();
    let mut writer = open_sink(request.sink(), start_offset).await?;
    let mut throttle = request.rate_limit().map(Throttle::new);
    let mut stream = response.bytes_stream();

    let streamed: Result<(), TransferError> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::network(request.url(), e))?;
            writer.write_chunk(&chunk).await?;
            result.bytes_transferred = writer.written();
            if let Some(throttle) = throttle.as_mut() {
                throttle.pace(chunk.len()).await;
            }
        }
        Ok(())
    }
    .await;

    // Flush even on failure so the written prefix is resumable.
    let flushed = writer.flush().await;
    streamed?;
    flushed?;

    if let Some(expected) = content_length
        && writer.written() < expected
    {
        return Err(TransferError::IncompleteBody {
            url: request.url().to_string(),
            expected,
            received: writer.written(),
        });
    }

    Ok(())
}

/// Rejects URLs the client cannot or should not fetch.
fn validate_url(url: &str) -> Result<(), TransferError> {
    let parsed = Url::parse(url).map_err(|_| TransferError::invalid_url(url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransferError::unsupported_scheme(url, other)),
    }
}

/// 2xx and 3xx are accepted; everything else becomes an error without the
/// body ever reaching the sink.
fn check_status(url: &str, response: &reqwest::Response) -> Result<(), TransferError> {
    let status = response.status();
    if status.is_success() || status.is_redirection() {
        return Ok(());
    }

    let code = status.as_u16();
    if matches!(code, 401 | 403 | 407) {
        return Err(TransferError::auth_required(url, code));
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Err(TransferError::http_status_with_retry_after(
        url,
        code,
        retry_after,
    ))
}

/// A 3xx body is not the resource, so it must not be appended to (or replace)
/// the bytes already in the sink.
fn redirect_on_resume(url: &str, response: &reqwest::Response) -> TransferError {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    warn!(
        status = response.status().as_u16(),
        location = location.as_deref().unwrap_or("-"),
        "redirect answered a ranged request; leaving the partial file untouched"
    );
    TransferError::RedirectOnResume {
        url: url.to_string(),
        status: response.status().as_u16(),
        location,
    }
}

/// Works out where the response body belongs in the sink.
///
/// Only a `206` can continue at `offset`; any other accepted status carries
/// the resource from byte 0.
fn resolve_start_offset(
    url: &str,
    response: &reqwest::Response,
    offset: u64,
) -> Result<u64, TransferError> {
    if offset == 0 || response.status() != StatusCode::PARTIAL_CONTENT {
        return Ok(0);
    }

    let Some(start) = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_start)
    else {
        debug!("206 without a usable Content-Range; assuming requested offset");
        return Ok(offset);
    };

    match start {
        s if s == offset => Ok(offset),
        0 => Ok(0),
        s => Err(TransferError::range_mismatch(url, offset, s)),
    }
}

/// First byte position of a `Content-Range: bytes <start>-<end>/<total>` value.
fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Turns an attempt error into the outcome tag.
///
/// A stream sink cannot take back bytes it already emitted, so a transient
/// failure after output began ends the run.
fn classify_attempt_failure(
    request: &TransferRequest,
    error: TransferError,
    written: u64,
) -> AttemptOutcome {
    match classify_error(&error) {
        FailureType::Recoverable if !request.sink().is_resumable() && written > 0 => {
            warn!(error = %error, written, "stream output already started; cannot retry");
            AttemptOutcome::FatalFailure {
                reason: TransferError::StreamNotResumable {
                    url: request.url().to_string(),
                    written,
                },
            }
        }
        FailureType::Recoverable => AttemptOutcome::RecoverableFailure { reason: error },
        FailureType::Fatal => AttemptOutcome::FatalFailure { reason: error },
    }
}
