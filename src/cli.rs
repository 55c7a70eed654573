//! CLI argument definitions using clap derive macros.

use clap::{Parser, ValueEnum};

use wurl_core::BackoffStrategy;
use wurl_core::transfer::{DEFAULT_RETRY_BUDGET, parse_rate};

/// Fetch a URL to a local file, resuming and retrying as needed.
///
/// The output file defaults to the last path segment of the URL
/// (or index.html when there is none).
#[derive(Parser, Debug)]
#[command(name = "wurl")]
#[command(author, version, about)]
pub struct Args {
    /// URL to fetch
    pub url: String,

    /// Write output to FILE ('-' for standard output)
    #[arg(short = 'O', long = "output-document", value_name = "FILE")]
    pub output_document: Option<String>,

    /// Resume getting a partially-downloaded file
    #[arg(short = 'c', long = "continue")]
    pub resume: bool,

    /// Follow redirects
    #[arg(short = 'L', long)]
    pub location: bool,

    /// Show per-attempt progress (-vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print debug output, including HTTP-level tracing
    #[arg(short, long)]
    pub debug: bool,

    /// Suppress everything except the final error
    #[arg(short, long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// User name for HTTP authentication
    #[arg(long, value_name = "USER")]
    pub http_user: Option<String>,

    /// Password for HTTP authentication
    #[arg(long, value_name = "PASS", requires = "http_user")]
    pub http_password: Option<String>,

    /// Do not validate the server's TLS certificate
    #[arg(long)]
    pub no_check_certificate: bool,

    /// Route the request through this proxy
    #[arg(long, value_name = "URL", conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Ignore proxies from the environment
    #[arg(long)]
    pub no_proxy: bool,

    /// Limit the transfer rate, e.g. 200K, 1M or 512 (bytes per second)
    #[arg(long, value_name = "RATE", value_parser = parse_rate_arg)]
    pub limit_rate: Option<u64>,

    /// Retry budget: additional attempts after the first (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RETRY_BUDGET)]
    pub retry: u32,

    /// Delay strategy between retries
    #[arg(long, value_enum, default_value_t = BackoffArg::Exponential)]
    pub retry_backoff: BackoffArg,

    /// Send this User-Agent header
    #[arg(long, value_name = "AGENT")]
    pub user_agent: Option<String>,

    /// Send this Referer header
    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Whole-attempt timeout in seconds (0 = none)
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub timeout: u64,

    /// DNS resolution timeout in seconds (0 = none)
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub dns_timeout: u64,

    /// Connection timeout in seconds (0 = none)
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub connect_timeout: u64,

    /// Read idle timeout in seconds (0 = none)
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub read_timeout: u64,

    /// Extra request header "Name: value" (repeatable)
    #[arg(long = "header", value_name = "HEADER", action = clap::ArgAction::Append)]
    pub headers: Vec<String>,

    /// Connect over IPv4 only
    #[arg(short = '4', long = "inet4-only", conflicts_with = "inet6_only")]
    pub inet4_only: bool,

    /// Connect over IPv6 only
    #[arg(short = '6', long = "inet6-only")]
    pub inet6_only: bool,
}

/// `--retry-backoff` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    /// One second between attempts
    Fixed,
    /// Doubling delay with jitter, capped at 30 seconds
    Exponential,
}

impl From<BackoffArg> for BackoffStrategy {
    fn from(value: BackoffArg) -> Self {
        match value {
            BackoffArg::Fixed => BackoffStrategy::fixed(),
            BackoffArg::Exponential => BackoffStrategy::default(),
        }
    }
}

fn parse_rate_arg(value: &str) -> Result<u64, String> {
    parse_rate(value).map_err(|e| e.to_string())
}
