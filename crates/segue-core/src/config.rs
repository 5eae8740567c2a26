//! Player configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of output channels. The engine always renders stereo.
pub const CHANNELS: u16 = 2;

/// Tunables for a player instance.
///
/// Every field has a default, so a partial TOML table deserializes fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Stream sample rate; sources at other rates are resampled to it.
    pub sample_rate: u32,
    /// Preferred frames per output callback.
    pub block_size: u32,
    /// Bytes of system memory that must stay free after a load.
    pub ram_headroom_bytes: u64,
    /// Cadence of the volume ramp scheduler.
    pub setting_delay_ms: u64,
    /// Polling interval of the completion waiters.
    pub min_delay_ms: u64,
    /// Polling interval while waiting on the loader.
    pub load_poll_interval_ms: u64,
    /// A synchronous load that waits longer than this is reported.
    pub load_wait_report_secs: u64,
    /// Capacity of the status event channel.
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1028,
            ram_headroom_bytes: 16 * 1024 * 1024,
            setting_delay_ms: 50,
            min_delay_ms: 50,
            load_poll_interval_ms: 100,
            load_wait_report_secs: 5,
            event_capacity: 64,
        }
    }
}

impl PlayerConfig {
    /// Check that every rate, size and interval is usable.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (u64::from(self.sample_rate), "sample_rate"),
            (u64::from(self.block_size), "block_size"),
            (self.setting_delay_ms, "setting_delay_ms"),
            (self.min_delay_ms, "min_delay_ms"),
            (self.load_poll_interval_ms, "load_poll_interval_ms"),
            (self.event_capacity as u64, "event_capacity"),
        ];

        for (value, name) in checks {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }

    pub const fn setting_delay(&self) -> Duration {
        Duration::from_millis(self.setting_delay_ms)
    }

    pub const fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub const fn load_poll_interval(&self) -> Duration {
        Duration::from_millis(self.load_poll_interval_ms)
    }

    pub const fn load_wait_report(&self) -> Duration {
        Duration::from_secs(self.load_wait_report_secs)
    }

    /// Ramp cadence in seconds, as used for decibel step computation.
    pub fn setting_delay_secs(&self) -> f32 {
        self.setting_delay_ms as f32 / 1000.0
    }
}
