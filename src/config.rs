//! Runtime knobs read from the environment
//!
//! The provisioning record itself lives in the state file (see [`crate::state`]).
//! What is configured here is how the tool behaves while it works: how often
//! it polls for receipts, how long it waits, and where passphrases are cached.
//! A `.env` file in the working directory is honoured.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::warn;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

pub const ENV_POLL_INTERVAL_MS: &str = "DEPLOYER_POLL_INTERVAL_MS";
pub const ENV_CONFIRMATION_TIMEOUT_SECS: &str = "DEPLOYER_CONFIRMATION_TIMEOUT_SECS";
pub const ENV_PASSPHRASE_CACHE: &str = "DEPLOYER_PASSPHRASE_CACHE";

fn default_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
}

fn default_confirmation_timeout() -> Option<Duration> {
    Some(Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS))
}

/// Where successfully used keystore passphrases are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Plaintext JSON file that survives restarts.
    #[default]
    Persist,
    /// In memory for the lifetime of the process.
    Session,
    /// Never remembered; every keystore prompts.
    Disabled,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persist" | "file" => Ok(CachePolicy::Persist),
            "session" | "memory" => Ok(CachePolicy::Session),
            "off" | "disabled" | "none" => Ok(CachePolicy::Disabled),
            other => Err(format!(
                "unknown passphrase cache policy '{other}' (expected persist, session or off)"
            )),
        }
    }
}

/// How transaction confirmations are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    /// `None` waits until the receipt shows up or the run is cancelled.
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: default_confirmation_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeConfig {
    pub confirmation: ConfirmationPolicy,
    pub cache_policy: CachePolicy,
}

impl RuntimeConfig {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        if Path::new(".env").exists() {
            dotenvy::from_filename(".env").wrap_err("Failed to load .env file")?;
        }
        Ok(Self::from_env())
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let poll_interval = lookup(ENV_POLL_INTERVAL_MS)
            .and_then(|v| parse_or_warn::<u64>(ENV_POLL_INTERVAL_MS, &v))
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(default_poll_interval);

        let timeout = match lookup(ENV_CONFIRMATION_TIMEOUT_SECS)
            .and_then(|v| parse_or_warn::<u64>(ENV_CONFIRMATION_TIMEOUT_SECS, &v))
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => default_confirmation_timeout(),
        };

        let cache_policy = lookup(ENV_PASSPHRASE_CACHE)
            .and_then(|v| match v.parse::<CachePolicy>() {
                Ok(policy) => Some(policy),
                Err(e) => {
                    warn!(var = ENV_PASSPHRASE_CACHE, error = %e, "Ignoring invalid value");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            confirmation: ConfirmationPolicy {
                poll_interval,
                timeout,
            },
            cache_policy,
        }
    }
}

fn parse_or_warn<T: FromStr>(var: &str, value: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match value.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = var, value = value, error = %e, "Ignoring invalid value");
            None
        }
    }
}
