//! Client configuration.
//!
//! DESIGN
//! ======
//! Reconnect, heartbeat, and viewer timings are tunables with defaults
//! matching the deployed service, overridable through `ENGAGE_*` environment
//! variables. Unparseable values fall back to the default rather than failing
//! startup.

use std::time::Duration;

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

const DEFAULT_RECONNECT_BASE_MS: u64 = 1000;
const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_HEARTBEAT_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 150;
const DEFAULT_RECENTER_SETTLE_MS: u64 = 100;

/// Tuning knobs for the live session client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the engage service, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    /// Base delay for exponential reconnect back-off.
    pub reconnect_base_delay: Duration,
    /// Ceiling for the reconnect back-off delay.
    pub reconnect_max_delay: Duration,
    /// Consecutive connection failures tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Cadence of the client-side liveness heartbeat.
    pub heartbeat_interval: Duration,
    /// Per-request timeout for REST calls (never applied to the push channel).
    pub request_timeout: Duration,
    /// TCP connect timeout for all outbound calls.
    pub connect_timeout: Duration,
    /// Quiet window collapsing bursts of viewport resizes into one recenter.
    pub resize_debounce: Duration,
    /// Delay before the automatic recenter after canvas content loads, giving
    /// the rendering surface time to finish its own layout pass.
    pub recenter_settle_delay: Duration,
}

impl ClientConfig {
    /// Configuration with the stated defaults against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reconnect_base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            resize_debounce: Duration::from_millis(DEFAULT_RESIZE_DEBOUNCE_MS),
            recenter_settle_delay: Duration::from_millis(DEFAULT_RECENTER_SETTLE_MS),
        }
    }

    /// Load configuration from environment variables, defaulting anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ENGAGE_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_owned());
        Self {
            base_url,
            reconnect_base_delay: Duration::from_millis(env_parse(
                "ENGAGE_RECONNECT_BASE_MS",
                DEFAULT_RECONNECT_BASE_MS,
            )),
            reconnect_max_delay: Duration::from_millis(env_parse(
                "ENGAGE_RECONNECT_MAX_MS",
                DEFAULT_RECONNECT_MAX_MS,
            )),
            max_reconnect_attempts: env_parse(
                "ENGAGE_MAX_RECONNECT_ATTEMPTS",
                DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ),
            heartbeat_interval: Duration::from_millis(env_parse(
                "ENGAGE_HEARTBEAT_MS",
                DEFAULT_HEARTBEAT_MS,
            )),
            request_timeout: Duration::from_millis(env_parse(
                "ENGAGE_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            connect_timeout: Duration::from_millis(env_parse(
                "ENGAGE_CONNECT_TIMEOUT_MS",
                DEFAULT_CONNECT_TIMEOUT_MS,
            )),
            resize_debounce: Duration::from_millis(env_parse(
                "ENGAGE_RESIZE_DEBOUNCE_MS",
                DEFAULT_RESIZE_DEBOUNCE_MS,
            )),
            recenter_settle_delay: Duration::from_millis(env_parse(
                "ENGAGE_RECENTER_SETTLE_MS",
                DEFAULT_RECENTER_SETTLE_MS,
            )),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    parse_or(std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T>(value: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    value.and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}
