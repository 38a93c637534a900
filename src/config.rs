use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::endpoints::EndpointResolver;
use crate::error::DashboardError;
use crate::poll::{PollOptions, RetryPolicy};
use crate::settings::PersistentSettings;

/// NotTofu dashboard — mirrors test-run state from the NotTofu backend API.
#[derive(Parser, Debug, Clone)]
#[command(name = "nottofu-dashboard")]
pub struct CliArgs {
    /// Base URL of the backend API
    #[arg(long = "api-url", env = "NOTTOFU_API_URL")]
    pub api_url: Option<String>,

    /// Path segment of the test-run collection ("runs", or the legacy "test-runs")
    #[arg(long = "runs-path", env = "NOTTOFU_RUNS_PATH")]
    pub runs_path: Option<String>,

    /// Poll interval for test-run data, in milliseconds
    #[arg(long = "refresh-interval-ms", env = "NOTTOFU_REFRESH_INTERVAL_MS")]
    pub refresh_interval_ms: Option<u64>,

    /// Poll interval for the API status indicator, in milliseconds
    #[arg(long = "status-interval-ms", env = "NOTTOFU_STATUS_INTERVAL_MS")]
    pub status_interval_ms: Option<u64>,

    /// Per-request timeout, in milliseconds
    #[arg(long = "request-timeout-ms", env = "NOTTOFU_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Local HTTP port the dashboard listens on
    #[arg(long = "port", env = "NOTTOFU_DASHBOARD_PORT", default_value_t = DEFAULT_DASHBOARD_PORT)]
    pub port: u16,

    /// JSON settings file (defaults to <config dir>/nottofu/dashboard.json)
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub runs_path: String,
    pub refresh_interval: Duration,
    pub status_interval: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub port: u16,
    pub log_file: Option<PathBuf>,
}

// Backend constants
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_RUNS_PATH: &str = "runs";
pub const LEGACY_RUNS_PATH: &str = "test-runs";

// Refresh intervals
pub const DATA_REFRESH_INTERVAL_MS: u64 = 5000;
pub const API_STATUS_CHECK_INTERVAL_MS: u64 = 10000;

// Timeouts
pub const API_REQUEST_TIMEOUT_MS: u64 = 5000;

// Retry constants
pub const RETRY_BASE_DELAY_MS: u64 = 1000;
pub const RETRY_MAX_DELAY_MS: u64 = 10000;
pub const MAX_AUTO_RETRIES: u32 = 5;

// Dashboard constants
pub const DEFAULT_DASHBOARD_PORT: u16 = 8050;
pub const EVENT_BUFFER_SIZE: usize = 500;
pub const MAX_DETAIL_CONTROLLERS: usize = 16;

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_string(),
            runs_path: DEFAULT_RUNS_PATH.to_string(),
            refresh_interval: Duration::from_millis(DATA_REFRESH_INTERVAL_MS),
            status_interval: Duration::from_millis(API_STATUS_CHECK_INTERVAL_MS),
            request_timeout: Duration::from_millis(API_REQUEST_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            port: DEFAULT_DASHBOARD_PORT,
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Merge CLI/env values over the settings file over built-in defaults.
    pub fn from_args(args: CliArgs, settings: &PersistentSettings) -> Self {
        let millis = |cli: Option<u64>, file: Option<u64>, default: u64| {
            Duration::from_millis(cli.or(file).unwrap_or(default))
        };

        ClientConfig {
            api_url: args
                .api_url
                .or_else(|| settings.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            runs_path: args
                .runs_path
                .or_else(|| settings.runs_path.clone())
                .unwrap_or_else(|| DEFAULT_RUNS_PATH.to_string()),
            refresh_interval: millis(
                args.refresh_interval_ms,
                settings.refresh_interval_ms,
                DATA_REFRESH_INTERVAL_MS,
            ),
            status_interval: millis(
                args.status_interval_ms,
                settings.status_interval_ms,
                API_STATUS_CHECK_INTERVAL_MS,
            ),
            request_timeout: millis(
                args.request_timeout_ms,
                settings.request_timeout_ms,
                API_REQUEST_TIMEOUT_MS,
            ),
            retry: RetryPolicy::default(),
            port: args.port,
            log_file: args.log_file,
        }
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        let parsed = url::Url::parse(&self.api_url).map_err(|e| {
            DashboardError::InvalidConfig(format!("api url {:?}: {}", self.api_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DashboardError::InvalidConfig(format!(
                "api url {:?} must use http or https",
                self.api_url
            )));
        }
        if self.runs_path.trim_matches('/').is_empty() {
            return Err(DashboardError::InvalidConfig(
                "runs path must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("refresh interval", self.refresh_interval),
            ("status interval", self.status_interval),
            ("request timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(DashboardError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn resolver(&self) -> EndpointResolver {
        EndpointResolver::new(&self.api_url, &self.runs_path)
    }

    pub fn data_poll_options(&self) -> PollOptions {
        PollOptions {
            interval: self.refresh_interval,
            retry: self.retry,
        }
    }

    pub fn status_poll_options(&self) -> PollOptions {
        PollOptions {
            interval: self.status_interval,
            retry: self.retry,
        }
    }
}
