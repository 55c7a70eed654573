use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::{Args, BackoffArg};
use wurl_core::BackoffStrategy;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) retry: bool,
    pub(crate) retry_backoff: bool,
    pub(crate) limit_rate: bool,
    pub(crate) timeout: bool,
    pub(crate) connect_timeout: bool,
    pub(crate) read_timeout: bool,
    pub(crate) user_agent: bool,
    pub(crate) proxy: bool,
    pub(crate) no_proxy: bool,
    pub(crate) no_check_certificate: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
    pub(crate) debug: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let command = Args::command();
    let matches = command.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = collect_sources(&matches);
    (args, sources)
}

fn collect_sources(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        retry: is_commandline_value(matches, "retry"),
        retry_backoff: is_commandline_value(matches, "retry_backoff"),
        limit_rate: is_commandline_value(matches, "limit_rate"),
        timeout: is_commandline_value(matches, "timeout"),
        connect_timeout: is_commandline_value(matches, "connect_timeout"),
        read_timeout: is_commandline_value(matches, "read_timeout"),
        user_agent: is_commandline_value(matches, "user_agent"),
        proxy: is_commandline_value(matches, "proxy"),
        no_proxy: is_commandline_value(matches, "no_proxy"),
        no_check_certificate: is_commandline_value(matches, "no_check_certificate"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
        debug: is_commandline_value(matches, "debug"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills every option the command line left unset from the config file.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Args {
    let Some(file_config) = file_config else {
        return args;
    };

    if !cli_sources.retry
        && let Some(retry) = file_config.retry
    {
        args.retry = retry;
    }

    if !cli_sources.retry_backoff
        && let Some(backoff) = file_config.retry_backoff
    {
        args.retry_backoff = match backoff {
            BackoffStrategy::Fixed(_) => BackoffArg::Fixed,
            BackoffStrategy::Exponential { .. } => BackoffArg::Exponential,
        };
    }

    if !cli_sources.limit_rate
        && let Some(limit_rate) = file_config.limit_rate
    {
        args.limit_rate = Some(limit_rate);
    }

    if !cli_sources.timeout
        && let Some(timeout) = file_config.timeout
    {
        args.timeout = timeout;
    }

    if !cli_sources.connect_timeout
        && let Some(connect_timeout) = file_config.connect_timeout
    {
        args.connect_timeout = connect_timeout;
    }

    if !cli_sources.read_timeout
        && let Some(read_timeout) = file_config.read_timeout
    {
        args.read_timeout = read_timeout;
    }

    if !cli_sources.user_agent
        && let Some(user_agent) = &file_config.user_agent
    {
        args.user_agent = Some(user_agent.clone());
    }

    // --no-proxy on the command line also suppresses a configured proxy.
    if !cli_sources.proxy
        && !cli_sources.no_proxy
        && let Some(proxy) = &file_config.proxy
    {
        args.proxy = Some(proxy.clone());
    }

    if !cli_sources.no_check_certificate
        && let Some(no_check_certificate) = file_config.no_check_certificate
    {
        args.no_check_certificate = no_check_certificate;
    }

    if !cli_sources.verbose
        && !cli_sources.quiet
        && !cli_sources.debug
        && let Some(verbosity) = file_config.verbosity
    {
        apply_config_verbosity(&mut args, verbosity);
    }

    args
}

fn apply_config_verbosity(args: &mut Args, verbosity: VerbositySetting) {
    match verbosity {
        VerbositySetting::Default => {
            args.quiet = false;
            args.debug = false;
            args.verbose = 0;
        }
        VerbositySetting::Verbose => {
            args.quiet = false;
            args.debug = false;
            args.verbose = 1;
        }
        VerbositySetting::Quiet => {
            args.quiet = true;
            args.debug = false;
            args.verbose = 0;
        }
        VerbositySetting::Debug => {
            args.quiet = false;
            args.debug = true;
            args.verbose = 0;
        }
    }
}

/// Retry notices are warnings, so the default level keeps them visible.
pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else if args.debug {
        "debug"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet || cli_sources.debug
}
