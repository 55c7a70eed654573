use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{debug, error};
use wurl_core::transfer::{IpFamily, ProxySetting};
use wurl_core::{RetryPolicy, Sink, TransferController, TransferRequest};

use crate::ProcessExit;
use crate::app::{config_runtime, exit_handler, terminal};
use crate::app_config;
use crate::cli::Args;

pub(crate) async fn run_wurl() -> Result<ProcessExit> {
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();

    let loaded = app_config::load_default_file_config()?;
    let args = config_runtime::apply_config_defaults(args, &cli_sources, loaded.config.as_ref());

    let default_level = config_runtime::resolve_default_log_level(&args);
    let force_cli_log_level = config_runtime::should_force_cli_log_level(&cli_sources);
    terminal::init_tracing(default_level, force_cli_log_level, terminal::is_no_color_requested());

    if loaded.config.is_some()
        && let Some(path) = &loaded.path
    {
        debug!(path = %path.display(), "loaded config file");
    }
    debug!(url = %args.url, "CLI arguments parsed");

    let request = build_request(&args)?;
    let policy = RetryPolicy::from_budget(args.retry).with_backoff(args.retry_backoff.into());

    let controller = match TransferController::new(request) {
        Ok(controller) => controller,
        Err(e) => {
            error!("cannot set up HTTP client: {e}");
            return Ok(ProcessExit::Failure);
        }
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(Arc::clone(&interrupted));

    let outcome = controller
        .with_retry_policy(policy)
        .with_interrupt(interrupted)
        .run()
        .await;

    Ok(exit_handler::determine_exit_outcome(outcome.status))
}

fn spawn_interrupt_listener(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });
}

/// Maps parsed arguments onto a transfer request.
pub(crate) fn build_request(args: &Args) -> Result<TransferRequest> {
    let sink = args
        .output_document
        .as_deref()
        .map_or_else(|| Sink::for_url(&args.url), Sink::from_arg);

    let proxy = if args.no_proxy {
        ProxySetting::Disabled
    } else if let Some(proxy) = &args.proxy {
        ProxySetting::Explicit(proxy.clone())
    } else {
        ProxySetting::Environment
    };

    let ip_family = if args.inet4_only {
        IpFamily::V4Only
    } else if args.inet6_only {
        IpFamily::V6Only
    } else {
        IpFamily::Any
    };

    let mut builder = TransferRequest::builder(args.url.clone())
        .sink(sink)
        .resume(args.resume)
        .retry_budget(args.retry)
        .timeout_secs(args.timeout)
        .connect_timeout_secs(args.connect_timeout)
        .read_timeout_secs(args.read_timeout)
        .dns_timeout_secs(args.dns_timeout)
        .rate_limit(args.limit_rate)
        .http_user(args.http_user.clone())
        .http_password(args.http_password.clone())
        .follow_redirects(args.location)
        .proxy(proxy)
        .verify_certificates(!args.no_check_certificate)
        .ip_family(ip_family)
        .user_agent(args.user_agent.clone())
        .referer(args.referer.clone());

    for header in &args.headers {
        builder = builder.header_line(header.clone());
    }

    builder.build().context("invalid request options")
}
