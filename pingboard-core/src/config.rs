//! Startup-time configuration: timing constants, scan policy and wiring.

use core::fmt;

use crate::hal::Micros;
use crate::KEY_LINES;

/// How the group scanner resolves which drive group is being sensed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanPolicy {
    /// Exactly one sense line must be active; anything else is ignored.
    StrictUniqueness,
    /// First falling edge by index wins, else first active line by index.
    EdgePriority,
}

/// Scanning parameters. Fixed for the lifetime of the firmware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    pub policy: ScanPolicy,
    /// Time a sense line must hold a level before it is trusted.
    ///
    /// Zero trusts raw levels. Otherwise it must be shorter than
    /// `drive_period_us`, and in practice a small fraction of it: after
    /// every group change the previous group's line stays active for up to
    /// this long.
    pub settle_us: Micros,
    /// Interval between self-drive timer firings.
    pub drive_period_us: Micros,
    /// Consecutive pressed readings before a key counts as pressed.
    pub debounce_threshold: u8,
}

impl ScanConfig {
    /// Strict-uniqueness scanning on raw sense levels.
    pub const fn new() -> Self {
        Self {
            policy: ScanPolicy::StrictUniqueness,
            settle_us: 0,
            drive_period_us: 100,
            debounce_threshold: 2,
        }
    }

    /// Edge-priority scanning on raw sense levels.
    ///
    /// A non-zero settle time must stay well below the drive period: until
    /// the previous group's line settles high it still counts as active, and
    /// its keys are read from the new group's key lines.
    pub const fn edge_priority() -> Self {
        Self {
            policy: ScanPolicy::EdgePriority,
            ..Self::new()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.drive_period_us == 0 {
            return Err(ConfigError::ZeroDrivePeriod);
        }
        if self.settle_us >= self.drive_period_us {
            return Err(ConfigError::SettleTooLong);
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps logical key positions to physical key lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Wiring {
    pub key_lines: [usize; KEY_LINES],
}

impl Wiring {
    /// The Pingboard PCB: positions 3 and 4 are crossed on the key lines.
    pub const fn pingboard() -> Self {
        Self {
            key_lines: [0, 1, 2, 4, 3, 5],
        }
    }

    pub const fn straight() -> Self {
        Self {
            key_lines: [0, 1, 2, 3, 4, 5],
        }
    }

    /// Physical key line for a logical position.
    pub fn key_line(&self, position: usize) -> usize {
        self.key_lines[position]
    }

    /// Every physical line must be used by exactly one position.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = [false; KEY_LINES];
        for &line in &self.key_lines {
            if line >= KEY_LINES || seen[line] {
                return Err(ConfigError::InvalidWiring { line });
            }
            seen[line] = true;
        }
        Ok(())
    }
}

impl Default for Wiring {
    fn default() -> Self {
        Self::pingboard()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroThreshold,
    ZeroDrivePeriod,
    SettleTooLong,
    InvalidWiring { line: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroThreshold => write!(f, "debounce threshold must be at least 1"),
            ConfigError::ZeroDrivePeriod => write!(f, "drive period must be non-zero"),
            ConfigError::SettleTooLong => {
                write!(f, "settle time must be shorter than the drive period")
            }
            ConfigError::InvalidWiring { line } => {
                write!(f, "key line {line} is out of range or mapped twice")
            }
        }
    }
}

impl core::error::Error for ConfigError {}
