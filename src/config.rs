use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::TimeDelta;
use serde::Serialize;
use tracing::Level;
use url::Url;

pub const DEFAULT_BACKEND_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
/// Longest accepted session lifetime: ten years.
pub const MAX_SESSION_HOURS: i64 = 10 * 365 * 24;

/// Validated gateway settings.
///
/// Secrets are skipped when serialized and redacted in `Debug` so the whole
/// struct can be logged at startup.
#[derive(Clone, Serialize)]
pub struct GatewayConfig {
    /// Listen address, e.g. `127.0.0.1:9080`
    pub bind: String,
    /// Backend base URL; its path is prepended to every forwarded path
    pub endpoint: Url,
    /// Shared secret sent to the backend on every forwarded call
    #[serde(skip)]
    pub api_key: String,
    /// Path of the authorization table
    pub authz_file: PathBuf,
    /// Session signing secret; random when absent
    #[serde(skip)]
    pub jwt_secret: Option<String>,
    /// Body of `GET /hello/revision`
    pub hello_reply: String,
    /// Idle read timeout on backend responses
    pub backend_timeout: Duration,
    /// Timeout for establishing a backend connection
    pub connect_timeout: Duration,
    /// Lifetime of a newly issued session
    pub session_hours: i64,
    /// Whether the session cookie carries the `Secure` attribute
    pub secure_cookie: bool,
}

impl GatewayConfig {
    /// Check the settings that would otherwise only fail on first use.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            bail!("API key must not be empty");
        }
        session_duration(self.session_hours)?;
        if self.backend_timeout.is_zero() || self.connect_timeout.is_zero() {
            bail!("Backend timeouts must be greater than zero");
        }
        Ok(())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &redact(&self.api_key))
            .field("authz_file", &self.authz_file)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<set>"))
            .field("hello_reply", &self.hello_reply)
            .field("backend_timeout", &self.backend_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("session_hours", &self.session_hours)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

/// Session lifetime for `hours`, bounded to `1..=MAX_SESSION_HOURS`.
pub fn session_duration(hours: i64) -> anyhow::Result<TimeDelta> {
    if hours <= 0 {
        bail!("Session duration must be positive: {}", hours);
    }
    if hours > MAX_SESSION_HOURS {
        bail!(
            "Session duration must be at most {} hours: {}",
            MAX_SESSION_HOURS,
            hours
        );
    }
    TimeDelta::try_hours(hours)
        .with_context(|| format!("Session duration out of range: {}", hours))
}

/// Parse and check the backend base URL.
pub fn parse_endpoint(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Fail to parse endpoint URL: {}", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!("Endpoint must be an http or https URL: {}", raw);
    }
    if url.host_str().is_none() {
        bail!("Endpoint has no host: {}", raw);
    }

    Ok(url)
}

pub fn parse_log_level(raw: &str) -> anyhow::Result<Level> {
    match raw {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!("Invalid log level: {}", raw),
    }
}

/// First four characters followed by `...`.
pub fn redact(secret: &str) -> String {
    let head: String = secret.chars().take(4).collect();
    format!("{}...", head)
}
