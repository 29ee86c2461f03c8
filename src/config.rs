//! Router configuration

use crate::errors::ConfigError;
use crate::types::{PointCode, PointCodeKind, KIND_COUNT};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Complete router configuration.
///
/// Timer values are milliseconds; absent values fall back to the
/// defaults below, and configured values are clamped to the minimum the
/// procedures tolerate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Act as a Signal Transfer Point (forward transit traffic)
    #[serde(default)]
    pub transfer: bool,
    /// Report User Part Unavailable upstream
    #[serde(default = "default_true")]
    pub sendupu: bool,
    /// Report Transfer Prohibited / No Address upstream
    #[serde(default = "default_true")]
    pub sendtfp: bool,
    /// MTP restart timer
    #[serde(default)]
    pub starttime: Option<u64>,
    /// Isolation shutdown timer
    #[serde(default)]
    pub isolation: Option<u64>,
    /// Periodic route test timer; 0 disables testing
    #[serde(default)]
    pub testroutes: Option<u64>,
    /// Also test Restricted routes, not only Prohibited
    #[serde(default)]
    pub testrestricted: bool,
    /// Local point codes, repeated `"TYPE,n-c-m"` entries
    #[serde(default)]
    pub local: Vec<String>,
    /// Attach the SNM management entity
    #[serde(default = "default_true")]
    pub management: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            transfer: false,
            sendupu: true,
            sendtfp: true,
            starttime: None,
            isolation: None,
            testroutes: None,
            testrestricted: false,
            local: Vec::new(),
            management: true,
        }
    }
}

fn clamp_interval(value: Option<u64>, min: u64, default: u64, allow_zero: bool) -> u64 {
    match value {
        None => default,
        Some(0) if allow_zero => 0,
        Some(0) => default,
        Some(v) if v < min => min,
        Some(v) => v,
    }
}

impl RouterConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Restart timer: at least 5 s; 60 s for an STP, 10 s for an SN
    pub fn restart_interval(&self) -> u64 {
        let default = if self.transfer { 60_000 } else { 10_000 };
        clamp_interval(self.starttime, 5_000, default, false)
    }

    /// Isolation timer: at least 500 ms, default 1 s
    pub fn isolation_interval(&self) -> u64 {
        clamp_interval(self.isolation, 500, 1_000, false)
    }

    /// Route test period: at least 10 s, default 50 s, 0 disables
    pub fn route_test_interval(&self) -> u64 {
        clamp_interval(self.testroutes, 10_000, 50_000, true)
    }

    /// Parse the `local` entries into the per-family packed array.
    ///
    /// Later entries for the same family overwrite earlier ones; a zero
    /// packed value is rejected as reserved.
    pub fn local_codes(&self) -> Result<[u32; KIND_COUNT], ConfigError> {
        let mut out = [0u32; KIND_COUNT];
        for entry in &self.local {
            let mut it = entry.splitn(2, ',');
            let kind: PointCodeKind = it
                .next()
                .unwrap_or("")
                .parse()
                .map_err(|_| ConfigError::PointCode(entry.clone()))?;
            let pc = it
                .next()
                .ok_or_else(|| ConfigError::PointCode(entry.clone()))
                .and_then(|s| {
                    PointCode::parse(s).map_err(|_| ConfigError::PointCode(entry.clone()))
                })?;
            let packed = pc.pack(kind);
            if packed == 0 {
                return Err(ConfigError::PointCode(entry.clone()));
            }
            out[kind.index()] = packed;
        }
        Ok(out)
    }
}
