//! Service configuration.
//!
//! Values come from the environment; anything unset or unparsable falls back
//! to the default.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_REPLAY_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    ///
    /// Env: `LEDGER_BIND_ADDR`, default `0.0.0.0:8080`
    pub bind_addr: SocketAddr,

    /// Upper bound on waiting for account locks before an operation fails as
    /// unavailable.
    ///
    /// Env: `LEDGER_LOCK_TIMEOUT_MS`, default 5000
    pub lock_timeout: Duration,

    /// Capacity of the channel between the CSV reader and the transfer
    /// processor in replay mode.
    ///
    /// Env: `LEDGER_REPLAY_BUFFER`, default 1024
    pub replay_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            replay_buffer: DEFAULT_REPLAY_BUFFER,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parse_or(&lookup, "LEDGER_BIND_ADDR", defaults.bind_addr),
            lock_timeout: Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_LOCK_TIMEOUT_MS",
                DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            )),
            replay_buffer: match parse_or(&lookup, "LEDGER_REPLAY_BUFFER", defaults.replay_buffer) {
                0 => {
                    warn!("LEDGER_REPLAY_BUFFER must be positive, using {DEFAULT_REPLAY_BUFFER}");
                    DEFAULT_REPLAY_BUFFER
                }
                n => n,
            },
        }
    }

    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    #[must_use]
    pub fn with_replay_buffer(mut self, replay_buffer: usize) -> Self {
        self.replay_buffer = replay_buffer.max(1);
        self
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, raw = %raw, ?default, "unparsable config value, using default");
            default
        }),
    }
}
