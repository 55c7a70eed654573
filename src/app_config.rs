//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use wurl_core::BackoffStrategy;
use wurl_core::transfer::parse_rate;

/// Largest timeout accepted from the config file (one day).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// `key = value` file configuration for wurl defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default retry budget (0 = unlimited).
    pub retry: Option<u32>,
    /// Default delay strategy between retries.
    pub retry_backoff: Option<BackoffStrategy>,
    /// Default rate ceiling in bytes per second.
    pub limit_rate: Option<u64>,
    /// Default whole-attempt timeout in seconds.
    pub timeout: Option<u64>,
    /// Default connect timeout in seconds.
    pub connect_timeout: Option<u64>,
    /// Default read timeout in seconds.
    pub read_timeout: Option<u64>,
    /// Default User-Agent.
    pub user_agent: Option<String>,
    /// Default proxy URL.
    pub proxy: Option<String>,
    /// Skip certificate validation by default.
    pub no_check_certificate: Option<bool>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("timeout", self.timeout)?;
        validate_timeout_secs("connect_timeout", self.connect_timeout)?;
        validate_timeout_secs("read_timeout", self.read_timeout)?;

        if let Some(proxy) = &self.proxy
            && proxy.trim().is_empty()
        {
            bail!("Invalid config value for `proxy`: expected a non-empty URL");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > MAX_TIMEOUT_SECS {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..={MAX_TIMEOUT_SECS}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/wurl/config.toml`
/// 2. `$HOME/.config/wurl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("wurl").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("wurl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "retry" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let budget = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("retry out of range for u32"))
                    .with_context(invalid)?;
                cfg.retry = Some(budget);
            }
            "retry_backoff" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.retry_backoff = Some(parse_backoff(&parsed).with_context(invalid)?);
            }
            "limit_rate" => {
                let raw_rate = parse_string_literal(value).unwrap_or_else(|_| value.to_string());
                let parsed = parse_rate(&raw_rate).with_context(invalid)?;
                cfg.limit_rate = Some(parsed);
            }
            "timeout" => cfg.timeout = Some(parse_integer_u64(value).with_context(invalid)?),
            "connect_timeout" => {
                cfg.connect_timeout = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout" => {
                cfg.read_timeout = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "proxy" => cfg.proxy = Some(parse_string_literal(value).with_context(invalid)?),
            "no_check_certificate" => {
                cfg.no_check_certificate = Some(parse_boolean(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_backoff(value: &str) -> Result<BackoffStrategy> {
    match value {
        "fixed" => Ok(BackoffStrategy::fixed()),
        "exponential" => Ok(BackoffStrategy::default()),
        _ => bail!("Expected one of: fixed, exponential"),
    }
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
