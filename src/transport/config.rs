//! Buffer sizing configuration for the adapters.

use std::env;
use std::time::Duration;

use crate::core::{
    DEFAULT_MAX_BUFFERED, DEFAULT_SCRATCH_READ_SIZE, ENV_MAX_BUFFERED, ENV_QUIT_POLL_MS,
    ENV_SCRATCH_READ_SIZE, MIN_SCRATCH_READ_SIZE,
};
use crate::error::ConduitError;
use crate::transport::{TransportError, TransportResult};

/// Sizing and polling options passed to an adapter at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Size of the scratch region each socket read fills.
    pub scratch_read_size: usize,

    /// Maximum bytes the accumulation buffer may hold.
    ///
    /// Must be at least `scratch_read_size`.
    pub max_buffered: usize,

    /// Read timeout for the blocking adapter, so a quit request is seen even
    /// when the peer is silent. `None` blocks indefinitely.
    ///
    /// Only applied by `BlockingTransport::connect`, which owns the socket it
    /// creates. Streams adopted through `from_stream` keep their own timeout
    /// settings, and the evented adapter ignores this field.
    pub quit_poll_interval: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scratch_read_size: DEFAULT_SCRATCH_READ_SIZE,
            max_buffered: DEFAULT_MAX_BUFFERED,
            quit_poll_interval: None,
        }
    }
}

impl TransportConfig {
    /// Start a builder with default options.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    /// Check the options are usable together.
    pub fn validate(&self) -> Result<(), ConduitError> {
        self.check().map_err(ConduitError::Config)
    }

    /// Check the options before an adapter is built from them.
    pub(crate) fn ensure_valid(&self) -> TransportResult<()> {
        self.check().map_err(TransportError::Config)
    }

    fn check(&self) -> Result<(), String> {
        if self.scratch_read_size < MIN_SCRATCH_READ_SIZE {
            return Err(format!(
                "scratch_read_size must be at least {MIN_SCRATCH_READ_SIZE}"
            ));
        }
        if self.max_buffered < self.scratch_read_size {
            return Err(format!(
                "max_buffered ({}) must be >= scratch_read_size ({})",
                self.max_buffered, self.scratch_read_size
            ));
        }
        if self.quit_poll_interval == Some(Duration::ZERO) {
            return Err("quit_poll_interval must be non-zero".to_string());
        }
        Ok(())
    }

    /// Build a configuration from defaults overridden by environment
    /// variables.
    ///
    /// - `CONDUIT_SCRATCH_READ_SIZE`: scratch read size in bytes
    /// - `CONDUIT_MAX_BUFFERED`: accumulation capacity in bytes
    /// - `CONDUIT_QUIT_POLL_MS`: blocking quit poll interval in milliseconds
    pub fn from_env() -> Result<Self, ConduitError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConduitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_SCRATCH_READ_SIZE) {
            config.scratch_read_size = parse_number(ENV_SCRATCH_READ_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_BUFFERED) {
            config.max_buffered = parse_number(ENV_MAX_BUFFERED, &value)?;
        }
        if let Some(value) = lookup(ENV_QUIT_POLL_MS) {
            let millis: u64 = parse_number(ENV_QUIT_POLL_MS, &value)?;
            config.quit_poll_interval = Some(Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConduitError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConduitError::Config(format!("{key}: invalid number {value:?}")))
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl Default for TransportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfigBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Set the scratch read size.
    pub fn scratch_read_size(mut self, size: usize) -> Self {
        self.config.scratch_read_size = size;
        self
    }

    /// Set the accumulation capacity.
    pub fn max_buffered(mut self, size: usize) -> Self {
        self.config.max_buffered = size;
        self
    }

    /// Set the blocking adapter's quit poll interval.
    pub fn quit_poll_interval(mut self, interval: Duration) -> Self {
        self.config.quit_poll_interval = Some(interval);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<TransportConfig, ConduitError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
