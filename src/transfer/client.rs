//! HTTP client wrapper shared by every attempt of a run.
//!
//! [`HttpClient`] is built once from a [`TransferRequest`] and applies the
//! request-independent settings (timeouts, proxy, certificate policy, address
//! family, redirect policy, User-Agent) at construction time. Per-attempt
//! settings (custom headers, credentials, the `Range` offset) are applied in
//! [`HttpClient::send`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::header::{RANGE, REFERER};
use reqwest::{Client, ClientBuilder, Proxy, redirect};
use tracing::{debug, instrument};

use super::error::TransferError;
use super::request::{IpFamily, ProxySetting, TransferRequest};
use crate::user_agent;

/// Redirect hops followed with `--location`.
const MAX_REDIRECTS: usize = 20;

/// HTTP client for one transfer run.
///
/// # Example
///
/// ```no_run
/// use wurl_core::transfer::{HttpClient, TransferRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = TransferRequest::builder("https://example.com/f.bin").build()?;
/// let client = HttpClient::from_request(&request)?;
/// let response = client.send(&request, 0).await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds the client from the request's connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientBuild`] when reqwest rejects the
    /// configuration (for example a proxy it cannot use or a missing TLS backend).
    #[instrument(level = "debug", skip(request), fields(url = %request.url()))]
    pub fn from_request(request: &TransferRequest) -> Result<Self, TransferError> {
        let builder = base_client_builder(request)?;
        let client = builder
            .build()
            .map_err(|source| TransferError::ClientBuild { source })?;
        debug!("HTTP client ready");
        Ok(Self { client })
    }

    /// Sends the GET for one attempt, asking for bytes from `offset` onwards
    /// when `offset` is non-zero.
    ///
    /// Only transport failures are errors here; status handling is left to
    /// the executor.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Network`] or [`TransferError::Timeout`].
    pub async fn send(
        &self,
        request: &TransferRequest,
        offset: u64,
    ) -> Result<reqwest::Response, TransferError> {
        let mut builder = self
            .client
            .get(request.url())
            .headers(request.headers().clone());

        if let Some(referer) = request.referer() {
            builder = builder.header(REFERER, referer);
        }
        if let Some(credentials) = request.credentials() {
            builder = builder.basic_auth(credentials.user(), credentials.password());
        }
        if offset > 0 {
            builder = builder.header(RANGE, format!("bytes={offset}-"));
        }

        builder
            .send()
            .await
            .map_err(|e| TransferError::network(request.url(), e))
    }
}

// TLS options moved behind `tls_*` names in newer reqwest releases; the old
// spellings remain as deprecated aliases.
#[allow(deprecated)]
fn base_client_builder(request: &TransferRequest) -> Result<ClientBuilder, TransferError> {
    let timeouts = request.timeouts();
    let user_agent = request
        .user_agent()
        .map_or_else(user_agent::default_user_agent, str::to_string);

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .danger_accept_invalid_certs(!request.verify_certificates())
        .redirect(if request.follow_redirects() {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        });

    if let Some(total) = timeouts.total {
        builder = builder.timeout(total);
    }
    if let Some(connect) = timeouts.connect_phase() {
        builder = builder.connect_timeout(connect);
    }
    if let Some(read) = timeouts.read {
        builder = builder.read_timeout(read);
    }

    builder = match request.proxy() {
        ProxySetting::Environment => builder,
        ProxySetting::Disabled => builder.no_proxy(),
        ProxySetting::Explicit(url) => {
            let proxy = Proxy::all(url.as_str())
                .map_err(|source| TransferError::ClientBuild { source })?;
            builder.proxy(proxy)
        }
    };

    builder = match request.ip_family() {
        IpFamily::Any => builder,
        IpFamily::V4Only => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        IpFamily::V6Only => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    };

    Ok(builder)
}
