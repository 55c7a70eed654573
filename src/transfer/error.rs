//! Error types for transfer attempts and request construction.
//!
//! [`TransferError`] describes why a single attempt failed and carries the
//! context (URL, sink path, HTTP status) needed for the retry decision and the
//! user-facing message. [`RequestError`] is returned when the caller hands in
//! a configuration that cannot be turned into a request at all.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a single transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request or body stream exceeded a configured timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// Authentication or authorization required to access the resource.
    #[error(
        "[AUTH] authentication required (HTTP {status}) fetching {url}\n  Suggestion: {suggestion}"
    )]
    AuthRequired {
        /// The URL that requires authentication.
        url: String,
        /// The HTTP status code (401, 403 or 407).
        status: u16,
        /// User-facing suggestion for resolving the auth issue.
        suggestion: &'static str,
    },

    /// Local sink error (open, truncate, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The sink path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL scheme is not served by this tool.
    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme {
        /// The URL as given.
        url: String,
        /// The rejected scheme.
        scheme: String,
    },

    /// The server answered a ranged request starting at an unexpected byte.
    #[error("server resumed {url} at byte {actual}, expected {expected}")]
    RangeMismatch {
        /// The URL being fetched.
        url: String,
        /// The offset that was requested.
        expected: u64,
        /// The offset the server reported in Content-Range.
        actual: u64,
    },

    /// A ranged request was answered with a redirect that is not being followed.
    #[error(
        "HTTP {status} redirect while resuming {url}; the partial file was kept\n  Suggestion: rerun with -L (--location) to follow it"
    )]
    RedirectOnResume {
        /// The URL being fetched.
        url: String,
        /// The 3xx status code.
        status: u16,
        /// The Location header, if the server sent one.
        location: Option<String>,
    },

    /// The body ended before the advertised Content-Length was received.
    #[error("body of {url} ended after {received} of {expected} bytes")]
    IncompleteBody {
        /// The URL being fetched.
        url: String,
        /// Content-Length of the response.
        expected: u64,
        /// Bytes actually received in this attempt.
        received: u64,
    },

    /// The HTTP client could not be constructed from the request settings.
    #[error("failed to initialize HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// A stream sink already emitted bytes and cannot be rewound for a retry.
    #[error("cannot restart {url} on a stream sink after {written} bytes were written")]
    StreamNotResumable {
        /// The URL being fetched.
        url: String,
        /// Bytes already emitted to the stream.
        written: u64,
    },
}

impl TransferError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            return Self::Timeout { url };
        }
        Self::Network { url, source }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported-scheme error.
    pub fn unsupported_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates a range mismatch error.
    pub fn range_mismatch(url: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::RangeMismatch {
            url: url.into(),
            expected,
            actual,
        }
    }

    /// Creates an authentication-required error.
    ///
    /// 407 points at proxy credentials, everything else at the HTTP credentials.
    pub fn auth_required(url: impl Into<String>, status: u16) -> Self {
        let suggestion = if status == 407 {
            "Check the --proxy URL and its credentials."
        } else {
            "Pass --http-user and --http-password for this server."
        };
        Self::AuthRequired {
            url: url.into(),
            status,
            suggestion,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::AuthRequired { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while building a [`TransferRequest`](super::TransferRequest).
///
/// These are caller contract violations: they are reported before any network
/// attempt is made and are never retried.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A `--header` line without a `Name: value` shape.
    #[error("invalid header '{line}': expected 'Name: value'")]
    MalformedHeader {
        /// The raw header line.
        line: String,
    },

    /// A header whose name or value is not valid HTTP.
    #[error("invalid header '{line}': {reason}")]
    InvalidHeader {
        /// The raw header line.
        line: String,
        /// Why the name or value was rejected.
        reason: String,
    },

    /// A rate string that is not a byte count with an optional K/M suffix.
    #[error("invalid rate '{value}': expected a byte count with optional K or M suffix")]
    InvalidRate {
        /// The raw rate string.
        value: String,
    },

    /// A proxy URL that reqwest refuses.
    #[error("invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        /// The raw proxy URL.
        url: String,
        /// The underlying parse error.
        #[source]
        source: reqwest::Error,
    },

    /// A password was supplied without a user name.
    #[error("--http-password requires --http-user")]
    PasswordWithoutUser,
}
