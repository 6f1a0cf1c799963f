//! Configuration type definitions

use tickwork_hal::Tick;

use crate::diagnostics::DEFAULT_REPORT_WINDOW;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Magic number identifying a stored configuration
pub const CONFIG_MAGIC: u32 = 0x5457_4B43; // "TWKC"

/// Current configuration format version
pub const CONFIG_VERSION: u8 = 1;

/// How reference ticks advance after an interval elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimingMode {
    /// Restart from the tick the interval was observed to elapse
    ///
    /// Late polling stretches the interval; no catch-up bursts.
    #[default]
    Relaxed,
    /// Advance by exactly the nominal interval
    ///
    /// No drift, but after a stall several intervals may elapse on
    /// consecutive ticks.
    Tight,
}

/// Which slot loses when two timeline windows start on the same tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TieBreak {
    /// The shorter window is postponed
    #[default]
    ShorterLoses,
    /// The longer window is postponed
    LongerLoses,
}

/// Overlap detection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverlapPolicy {
    /// Simultaneous-start rule
    pub tie_break: TieBreak,
    /// Normalize and overflow-check window arithmetic
    ///
    /// When disabled, window bounds are computed with wrapping arithmetic on
    /// the raw ticks.
    pub rollover_checks: bool,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::ShorterLoses,
            rollover_checks: true,
        }
    }
}

/// Rounding of sample averages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Division {
    /// Integer division (toward zero)
    #[default]
    Truncate,
    /// Round to the nearest integer, halves away from zero
    Nearest,
}

impl Division {
    /// Divide `sum` by `count` using this rounding
    ///
    /// `count` must be non-zero.
    pub fn apply(self, sum: i32, count: i32) -> i32 {
        match self {
            Division::Truncate => sum / count,
            Division::Nearest => {
                let half = count / 2;
                if (sum < 0) != (count < 0) {
                    (sum - half) / count
                } else {
                    (sum + half) / count
                }
            }
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Reference tick advancement for timers, timeline postponements and waveforms
    pub timing: TimingMode,
    /// Timeline overlap policy
    pub overlap: OverlapPolicy,
    /// Averaging rounding for signal conditioning
    pub division: Division,
    /// Diagnostics throttle window in ticks
    pub report_window: Tick,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingMode::Relaxed,
            overlap: OverlapPolicy::default(),
            division: Division::Truncate,
            report_window: DEFAULT_REPORT_WINDOW,
        }
    }
}

/// Errors when loading or storing a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Buffer too small or encoding failed
    Serialize,
    /// Data could not be decoded
    Deserialize,
    /// Header magic mismatch
    BadMagic,
    /// Stored with an unsupported format version
    UnsupportedVersion(u8),
}

/// Stored configuration with header
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct StoredConfig {
    magic: u32,
    version: u8,
    config: EngineConfig,
}

#[cfg(feature = "serde")]
impl EngineConfig {
    /// Encode into `buf` as postcard binary
    ///
    /// Returns the used part of the buffer.
    pub fn to_slice<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        let stored = StoredConfig {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            config: *self,
        };
        postcard::to_slice(&stored, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Decode a configuration written by [`EngineConfig::to_slice`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let stored: StoredConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        if stored.magic != CONFIG_MAGIC {
            return Err(ConfigError::BadMagic);
        }
        if stored.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(stored.version));
        }

        Ok(stored.config)
    }
}
