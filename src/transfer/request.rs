//! Immutable per-run transfer configuration.
//!
//! A [`TransferRequest`] is assembled through [`TransferRequestBuilder`], which
//! validates everything that can be validated without the network (header
//! lines, proxy URL, credentials) so that a bad configuration is rejected
//! before the first attempt.
//!
//! # Example
//!
//! ```
//! use wurl_core::transfer::{Sink, TransferRequest};
//!
//! let request = TransferRequest::builder("https://example.com/f.bin")
//!     .sink(Sink::from_arg("f.bin"))
//!     .resume(true)
//!     .retry_budget(3)
//!     .header_line("X-Trace: 1")
//!     .build()
//!     .unwrap();
//! assert!(request.resume());
//! assert_eq!(request.retry_budget(), 3);
//! ```

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::error::RequestError;
use super::sink::Sink;

/// Default retry budget (additional attempts after the first).
pub const DEFAULT_RETRY_BUDGET: u32 = 20;

/// HTTP credentials. The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: Option<String>,
}

impl Credentials {
    /// Creates credentials for basic authentication.
    #[must_use]
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the password, if one was given.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which address family outgoing connections may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IpFamily {
    /// Whatever the resolver returns.
    #[default]
    Any,
    /// IPv4 addresses only.
    V4Only,
    /// IPv6 addresses only.
    V6Only,
}

/// Proxy selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxySetting {
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` / `ALL_PROXY` from the environment.
    #[default]
    Environment,
    /// Route every request through this proxy URL.
    Explicit(String),
    /// Never use a proxy, even if the environment names one.
    Disabled,
}

/// Timeouts applied to every attempt. `None` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Whole-attempt deadline (request through last body byte).
    pub total: Option<Duration>,
    /// TCP/TLS connection establishment.
    pub connect: Option<Duration>,
    /// Maximum idle time between body reads.
    pub read: Option<Duration>,
    /// Name resolution. Folded into the connect phase by the HTTP client.
    pub dns: Option<Duration>,
}

impl Timeouts {
    /// Effective connect-phase limit: the tighter of `connect` and `dns`.
    #[must_use]
    pub fn connect_phase(&self) -> Option<Duration> {
        match (self.connect, self.dns) {
            (Some(connect), Some(dns)) => Some(connect.min(dns)),
            (connect, dns) => connect.or(dns),
        }
    }
}

/// Converts a seconds count where 0 means "no limit".
fn secs_or_unlimited(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Immutable configuration for one run of the transfer controller.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    url: String,
    sink: Sink,
    resume: bool,
    retry_budget: u32,
    timeouts: Timeouts,
    rate_limit: Option<u64>,
    credentials: Option<Credentials>,
    headers: HeaderMap,
    follow_redirects: bool,
    proxy: ProxySetting,
    verify_certificates: bool,
    ip_family: IpFamily,
    user_agent: Option<String>,
    referer: Option<String>,
}

impl TransferRequest {
    /// Starts building a request for `url`.
    ///
    /// The sink defaults to a file named after the last URL path segment.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> TransferRequestBuilder {
        TransferRequestBuilder::new(url.into())
    }

    /// Target URL as given.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Output sink.
    #[must_use]
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Whether an existing sink should be continued rather than truncated.
    #[must_use]
    pub fn resume(&self) -> bool {
        self.resume
    }

    /// Additional attempts allowed after the first; 0 means unlimited.
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Per-attempt timeouts.
    #[must_use]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Byte-rate ceiling in bytes per second, if any.
    #[must_use]
    pub fn rate_limit(&self) -> Option<u64> {
        self.rate_limit
    }

    /// HTTP credentials, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Extra request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether 3xx responses are followed.
    #[must_use]
    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Proxy selection.
    #[must_use]
    pub fn proxy(&self) -> &ProxySetting {
        &self.proxy
    }

    /// Whether TLS certificates are validated.
    #[must_use]
    pub fn verify_certificates(&self) -> bool {
        self.verify_certificates
    }

    /// Address family restriction.
    #[must_use]
    pub fn ip_family(&self) -> IpFamily {
        self.ip_family
    }

    /// User-Agent override.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Referer header value.
    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }
}

/// Builder for [`TransferRequest`].
///
/// Not `Debug`: it holds the raw password until `build` wraps it.
#[derive(Clone)]
pub struct TransferRequestBuilder {
    url: String,
    sink: Option<Sink>,
    resume: bool,
    retry_budget: u32,
    timeouts: Timeouts,
    rate_limit: Option<u64>,
    user: Option<String>,
    password: Option<String>,
    header_lines: Vec<String>,
    follow_redirects: bool,
    proxy: ProxySetting,
    verify_certificates: bool,
    ip_family: IpFamily,
    user_agent: Option<String>,
    referer: Option<String>,
}

impl TransferRequestBuilder {
    fn new(url: String) -> Self {
        Self {
            url,
            sink: None,
            resume: false,
            retry_budget: DEFAULT_RETRY_BUDGET,
            timeouts: Timeouts::default(),
            rate_limit: None,
            user: None,
            password: None,
            header_lines: Vec::new(),
            follow_redirects: false,
            proxy: ProxySetting::default(),
            verify_certificates: true,
            ip_family: IpFamily::default(),
            user_agent: None,
            referer: None,
        }
    }

    /// Sets the output sink.
    #[must_use]
    pub fn sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Continue an existing partial sink.
    #[must_use]
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Additional attempts after the first; 0 means unlimited.
    #[must_use]
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Whole-attempt timeout in seconds, 0 for none.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeouts.total = secs_or_unlimited(secs);
        self
    }

    /// Connect timeout in seconds, 0 for none.
    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.timeouts.connect = secs_or_unlimited(secs);
        self
    }

    /// Read (idle) timeout in seconds, 0 for none.
    #[must_use]
    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.timeouts.read = secs_or_unlimited(secs);
        self
    }

    /// DNS timeout in seconds, 0 for none.
    #[must_use]
    pub fn dns_timeout_secs(mut self, secs: u64) -> Self {
        self.timeouts.dns = secs_or_unlimited(secs);
        self
    }

    /// Byte-rate ceiling; `None` or `Some(0)` disables pacing.
    #[must_use]
    pub fn rate_limit(mut self, bytes_per_sec: Option<u64>) -> Self {
        self.rate_limit = bytes_per_sec.filter(|rate| *rate > 0);
        self
    }

    /// HTTP user name.
    #[must_use]
    pub fn http_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// HTTP password.
    #[must_use]
    pub fn http_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Adds a raw `Name: value` header line, validated in [`build`](Self::build).
    #[must_use]
    pub fn header_line(mut self, line: impl Into<String>) -> Self {
        self.header_lines.push(line.into());
        self
    }

    /// Follow 3xx redirects.
    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Proxy selection.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxySetting) -> Self {
        self.proxy = proxy;
        self
    }

    /// Validate TLS certificates (on by default).
    #[must_use]
    pub fn verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    /// Address family restriction.
    #[must_use]
    pub fn ip_family(mut self, family: IpFamily) -> Self {
        self.ip_family = family;
        self
    }

    /// User-Agent override.
    #[must_use]
    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Referer header.
    #[must_use]
    pub fn referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    /// Validates the configuration and produces the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] for malformed header lines, an unusable proxy
    /// URL, or a password without a user name.
    pub fn build(self) -> Result<TransferRequest, RequestError> {
        let headers = parse_header_lines(&self.header_lines)?;

        if let ProxySetting::Explicit(proxy_url) = &self.proxy {
            reqwest::Proxy::all(proxy_url.as_str()).map_err(|source| {
                RequestError::InvalidProxy {
                    url: proxy_url.clone(),
                    source,
                }
            })?;
        }

        let credentials = match (self.user, self.password) {
            (Some(user), password) => Some(Credentials::new(user, password)),
            (None, Some(_)) => return Err(RequestError::PasswordWithoutUser),
            (None, None) => None,
        };

        let sink = self.sink.unwrap_or_else(|| Sink::for_url(&self.url));

        Ok(TransferRequest {
            url: self.url,
            sink,
            resume: self.resume,
            retry_budget: self.retry_budget,
            timeouts: self.timeouts,
            rate_limit: self.rate_limit,
            credentials,
            headers,
            follow_redirects: self.follow_redirects,
            proxy: self.proxy,
            verify_certificates: self.verify_certificates,
            ip_family: self.ip_family,
            user_agent: self.user_agent,
            referer: self.referer,
        })
    }
}

/// Parses `Name: value` lines into a header map. Repeated names are kept.
fn parse_header_lines(lines: &[String]) -> Result<HeaderMap, RequestError> {
    let mut headers = HeaderMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(RequestError::MalformedHeader { line: line.clone() });
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(RequestError::MalformedHeader { line: line.clone() });
        }

        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
                line: line.clone(),
                reason: e.to_string(),
            })?;
        let value =
            HeaderValue::from_str(value.trim()).map_err(|e| RequestError::InvalidHeader {
                line: line.clone(),
                reason: e.to_string(),
            })?;
        headers.append(name, value);
    }
    Ok(headers)
}
