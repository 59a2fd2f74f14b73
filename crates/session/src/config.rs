//! Session configuration, read from the environment.

use std::time::Duration;

use simon_remote_core::{CodecError, SignalCodec};
use simon_remote_link::{Backoff, MIN_BACKOFF};
use simon_remote_types::{CONNECT_TIMEOUT_MS, DEFAULT_DEVICE_ADDRESS, DEFAULT_STEP_BASE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Hardware address, port name, or `host:port`, depending on the transport.
    pub device: String,
    pub connect_timeout: Duration,
    pub step_base: u8,
    pub max_pending_commands: usize,
    pub discovery_backoff: Backoff,
    pub wire_log_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE_ADDRESS.to_string(),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            step_base: DEFAULT_STEP_BASE,
            max_pending_commands: 32,
            discovery_backoff: Backoff::default(),
            wire_log_path: None,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();

        let device = env::var("SIMON_DEVICE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.device);

        let connect_timeout = env::var("SIMON_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_timeout);

        let step_base = env::var("SIMON_STEP_BASE")
            .ok()
            .and_then(|s| parse_byte(&s))
            .unwrap_or(defaults.step_base);

        let max_pending_commands = env::var("SIMON_MAX_PENDING")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_pending_commands);

        let discovery_backoff = discovery_backoff(
            env::var("SIMON_DISCOVERY_BACKOFF_MS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_millis),
            env::var("SIMON_DISCOVERY_BACKOFF_MAX_MS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_millis),
        );

        let wire_log_path = env::var("SIMON_WIRE_LOG_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .and_then(|s| if s.is_empty() { None } else { Some(s) });

        Self {
            device,
            connect_timeout,
            step_base,
            max_pending_commands,
            discovery_backoff,
            wire_log_path,
        }
    }

    pub fn codec(&self) -> Result<SignalCodec, CodecError> {
        SignalCodec::new(self.step_base)
    }
}

/// Unset bounds fall back to the defaults; `initial` is at least
/// [`MIN_BACKOFF`] and `max` never below it.
fn discovery_backoff(initial: Option<Duration>, max: Option<Duration>) -> Backoff {
    let defaults = Backoff::default();
    let initial = initial.unwrap_or(defaults.initial).max(MIN_BACKOFF);
    let max = max.unwrap_or(defaults.max).max(initial);
    Backoff { initial, max }
}

/// Decimal or `0x`-prefixed hex.
fn parse_byte(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
