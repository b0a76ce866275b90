//! Configuration management

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_LOG_DIRECTIVES: &str = "info";

/// Configuration errors (fatal at startup)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Log filter from `RUST_LOG` directives (`relaybot=debug,tower_http=info`)
///
/// Unset, blank or unparsable directives fall back to `info`.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

/// Process configuration
#[derive(Clone)]
pub struct Config {
    /// Slack request signing secret
    pub slack_signing_secret: String,

    /// Slack bot OAuth token
    pub slack_bot_token: String,

    /// Completion API key
    pub openai_api_key: String,

    /// Slack events listener port (PORT1)
    pub events_port: u16,

    /// Status surface port (PORT2)
    pub status_port: u16,

    /// Bind address for both listeners
    pub bind_addr: IpAddr,

    /// Bot's own member id (resolved via auth.test when unset)
    pub bot_member_id: Option<String>,

    /// Administrator member id
    pub admin_member_id: Option<String>,

    /// Channel for the startup test message
    pub test_channel_id: Option<String>,

    /// Completion model
    pub model: String,

    pub openai_api_base: String,

    pub slack_api_base: String,

    /// Gateway attempts per query (>= 1)
    pub completion_max_attempts: usize,

    /// Initial delay between attempts (zero disables backoff)
    pub completion_retry_delay: Duration,

    /// Per-attempt timeout (None waits indefinitely)
    pub completion_timeout: Option<Duration>,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let slack_signing_secret = required("SLACK_SIGNING_SECRET")?;
        let slack_bot_token = required("SLACK_BOT_TOKEN")?;
        let openai_api_key = required("OPENAI_API_KEY")?;
        let events_port = parse_value("PORT1", &required("PORT1")?)?;
        let status_port = parse_value("PORT2", &required("PORT2")?)?;

        let bind_addr = match get("BIND_ADDR") {
            Some(value) => parse_value("BIND_ADDR", &value)?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let completion_max_attempts: usize = match get("COMPLETION_MAX_ATTEMPTS") {
            Some(value) => parse_value("COMPLETION_MAX_ATTEMPTS", &value)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        if completion_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "COMPLETION_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let retry_delay_ms: u64 = match get("COMPLETION_RETRY_DELAY_MS") {
            Some(value) => parse_value("COMPLETION_RETRY_DELAY_MS", &value)?,
            None => 250,
        };

        let timeout_secs: u64 = match get("COMPLETION_TIMEOUT_SECS") {
            Some(value) => parse_value("COMPLETION_TIMEOUT_SECS", &value)?,
            None => 60,
        };

        let log_format = match get("LOG_FORMAT").map(|v| v.to_lowercase()) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(value) => return Err(ConfigError::Invalid { var: "LOG_FORMAT", value }),
        };

        Ok(Self {
            slack_signing_secret,
            slack_bot_token,
            openai_api_key,
            events_port,
            status_port,
            bind_addr,
            bot_member_id: get("BOT_MEMBER_ID"),
            admin_member_id: get("MY_MEMBER_ID"),
            test_channel_id: get("TEST_CHANNEL_ID"),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_api_base: get("OPENAI_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            slack_api_base: get("SLACK_API_BASE")
                .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
            completion_max_attempts,
            completion_retry_delay: Duration::from_millis(retry_delay_ms),
            completion_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            log_format,
        })
    }

    pub fn events_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.events_port)
    }

    pub fn status_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.status_port)
    }

    /// Log which required values are present, never their contents
    pub fn log_presence(&self) {
        let set = |v: &str| if v.is_empty() { "Not Set" } else { "Set" };
        info!("SLACK_SIGNING_SECRET: {}", set(&self.slack_signing_secret));
        info!("SLACK_BOT_TOKEN: {}", set(&self.slack_bot_token));
        info!("OPENAI_API_KEY: {}", set(&self.openai_api_key));
        info!("PORT1: {}", self.events_port);
        info!("PORT2: {}", self.status_port);
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("slack_signing_secret", &"<redacted>")
            .field("slack_bot_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("events_port", &self.events_port)
            .field("status_port", &self.status_port)
            .field("bind_addr", &self.bind_addr)
            .field("bot_member_id", &self.bot_member_id)
            .field("admin_member_id", &self.admin_member_id)
            .field("test_channel_id", &self.test_channel_id)
            .field("model", &self.model)
            .field("openai_api_base", &self.openai_api_base)
            .field("slack_api_base", &self.slack_api_base)
            .field("completion_max_attempts", &self.completion_max_attempts)
            .field("completion_retry_delay", &self.completion_retry_delay)
            .field("completion_timeout", &self.completion_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_value<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
