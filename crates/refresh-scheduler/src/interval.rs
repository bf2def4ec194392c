//! User-selectable refresh intervals

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected interval text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported refresh interval '{0}' (expected 5s, 10s, 30s or manual)")]
pub struct UnsupportedInterval(pub String);

/// Refresh cadence; the set is fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RefreshInterval {
    FiveSeconds,
    TenSeconds,
    #[default]
    ThirtySeconds,
    /// No automatic refresh
    Manual,
}

impl RefreshInterval {
    /// All intervals in display order
    pub const ALL: [RefreshInterval; 4] = [
        RefreshInterval::FiveSeconds,
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::Manual,
    ];

    /// Countdown length, `None` in manual mode
    pub fn seconds(&self) -> Option<u32> {
        match self {
            RefreshInterval::FiveSeconds => Some(5),
            RefreshInterval::TenSeconds => Some(10),
            RefreshInterval::ThirtySeconds => Some(30),
            RefreshInterval::Manual => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshInterval::FiveSeconds => "5s",
            RefreshInterval::TenSeconds => "10s",
            RefreshInterval::ThirtySeconds => "30s",
            RefreshInterval::Manual => "Manual",
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, RefreshInterval::Manual)
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RefreshInterval {
    type Err = UnsupportedInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5" | "5s" => Ok(RefreshInterval::FiveSeconds),
            "10" | "10s" => Ok(RefreshInterval::TenSeconds),
            "30" | "30s" => Ok(RefreshInterval::ThirtySeconds),
            "manual" | "m" => Ok(RefreshInterval::Manual),
            _ => Err(UnsupportedInterval(s.to_string())),
        }
    }
}

impl TryFrom<String> for RefreshInterval {
    type Error = UnsupportedInterval;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RefreshInterval> for String {
    fn from(interval: RefreshInterval) -> Self {
        interval.label().to_ascii_lowercase()
    }
}
