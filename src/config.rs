use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::MCP9808_ADDRESS;

/// Number of readings kept in the rolling history.
pub const HISTORY_LEN: usize = 10;

pub const DEFAULT_POLL_PERIOD_MS: u32 = 60_000;
pub const DEFAULT_BUS_TIMEOUT_MS: u32 = 100;
pub const DEFAULT_LOCK_TIMEOUT_MS: u32 = 100;

/// Upper bound for an encoded [`SamplerConfig`].
pub const CONFIG_MAX_ENCODED_LEN: usize = 32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config blob could not be decoded")]
    Decode,
    #[error("config could not be encoded")]
    Encode,
    #[error("poll period must be non-zero")]
    InvalidPeriod,
    #[error("bus and lock timeouts must be non-zero")]
    InvalidTimeout,
}

/// Sampling parameters, fixed for the lifetime of the sampler.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub poll_period_ms: u32,
    pub bus_address: u8,
    pub bus_timeout_ms: u32,
    pub lock_timeout_ms: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
            bus_address: MCP9808_ADDRESS,
            bus_timeout_ms: DEFAULT_BUS_TIMEOUT_MS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl SamplerConfig {
    pub const fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms as u64)
    }

    pub const fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms as u64)
    }

    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_period_ms == 0 {
            return Err(ConfigError::InvalidPeriod);
        }
        if self.bus_timeout_ms == 0 || self.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Decode a config blob written by [`SamplerConfig::to_slice`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_slice<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Encode)
    }
}
