//! Configuration options for opening a [`Sett`](crate::Sett).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sett_common::{SettError, SettResult};

use crate::keygen::DEFAULT_KEY_LENGTH;

/// Environment variable naming the database file.
pub const ENV_PATH: &str = "SETT_PATH";
/// Environment variable overriding the generated key length.
pub const ENV_KEY_LENGTH: &str = "SETT_KEY_LENGTH";
/// Environment variable toggling reclamation of expired entries on read.
pub const ENV_RECLAIM_ON_READ: &str = "SETT_RECLAIM_ON_READ";
/// Environment variable enabling the background expirer (milliseconds).
pub const ENV_EXPIRER_INTERVAL_MS: &str = "SETT_EXPIRER_INTERVAL_MS";

/// Database file used when `SETT_PATH` is unset.
pub const DEFAULT_PATH: &str = "./data/sett.redb";

/// Options for opening a store and for the handles created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Path of the redb database file.
    pub path: PathBuf,
    /// Length of keys generated by `insert` on new handles.
    pub default_key_length: usize,
    /// If true, reads that observe expired entries also delete them.
    /// Default: true.
    pub reclaim_on_read: bool,
    /// If set, a background thread purges expired entries at this interval.
    /// Default: none (expired entries are only reclaimed lazily).
    pub expirer_interval_ms: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Options::new(DEFAULT_PATH)
    }
}

impl Options {
    /// Default options for a database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Options {
            path: path.into(),
            default_key_length: DEFAULT_KEY_LENGTH,
            reclaim_on_read: true,
            expirer_interval_ms: None,
        }
    }

    /// Builds options from `SETT_*` environment variables, falling back to
    /// the defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `SettError::InvalidInput` if a variable is set but malformed.
    pub fn from_env() -> SettResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SettResult<Self> {
        let mut options = match lookup(ENV_PATH) {
            Some(path) => Options::new(path),
            None => Options::default(),
        };
        if let Some(raw) = lookup(ENV_KEY_LENGTH) {
            options.default_key_length = parse_env(ENV_KEY_LENGTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RECLAIM_ON_READ) {
            options.reclaim_on_read = parse_env(ENV_RECLAIM_ON_READ, &raw)?;
        }
        if let Some(raw) = lookup(ENV_EXPIRER_INTERVAL_MS) {
            options.expirer_interval_ms = Some(parse_env(ENV_EXPIRER_INTERVAL_MS, &raw)?);
        }
        options.validate()?;
        Ok(options)
    }

    /// Sets the generated key length.
    pub fn with_key_length(mut self, length: usize) -> Self {
        self.default_key_length = length;
        self
    }

    /// Enables the background expirer.
    ///
    /// Positive intervals shorter than a millisecond round up to one
    /// millisecond; a zero interval leaves the expirer disabled.
    pub fn with_expirer_interval(mut self, interval: Duration) -> Self {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.expirer_interval_ms = Some(if interval.is_zero() { 0 } else { millis.max(1) });
        self
    }

    /// Returns the expirer interval, if enabled.
    pub fn expirer_interval(&self) -> Option<Duration> {
        self.expirer_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Checks option values for consistency.
    ///
    /// # Errors
    ///
    /// Returns `SettError::InvalidInput` for a zero key length.
    pub fn validate(&self) -> SettResult<()> {
        if self.default_key_length == 0 {
            return Err(SettError::InvalidInput(
                "default_key_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> SettResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| SettError::InvalidInput(format!("{name} has an invalid value: {raw:?}")))
}
