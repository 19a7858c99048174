#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration-sheet parsing for the aquarium client.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The calibration sheet CSV loader enforces headers and rejects rows that
//!   could never be submitted (non-positive or non-finite volumes).
use serde::Deserialize;

/// Calibration sheet CSV schema.
///
/// Expected headers:
/// target,measured_ml
///
/// `target` is a 1-based dosing channel number, `drain` or `refill`.
///
/// Example:
/// target,measured_ml
/// 1,4.5
/// drain,120
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CalibrationRow {
    pub target: String,
    pub measured_ml: f64,
}

#[derive(Debug, Deserialize)]
pub struct Device {
    /// Base URL of the controller, e.g. `http://aquarium.local`
    pub base_url: String,
    #[serde(default = "default_status_path")]
    pub status_path: String,
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Name of the push event that carries a full status payload
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

fn default_status_path() -> String {
    "/api/status".to_string()
}

fn default_events_path() -> String {
    "/events".to_string()
}

fn default_event_name() -> String {
    "status".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub connect_ms: u64,
    /// Whole-request timeout for pulls and commands
    pub request_ms: u64,
    /// Read timeout on the push stream. The device pushes every ~2 s, so a
    /// silent stream past this is treated as lost.
    pub stream_idle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: 3000,
            request_ms: 5000,
            stream_idle_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncCfg {
    /// Delay between push subscription attempts
    pub reconnect_ms: u64,
    /// Pull the status once per reconnect attempt while the push stream is down
    pub fallback_poll: bool,
    /// Bounded queue between the subscription thread and the sync actor
    pub queue_depth: usize,
}

impl Default for SyncCfg {
    fn default() -> Self {
        Self {
            reconnect_ms: 3000,
            fallback_poll: false,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanCfg {
    pub retry_ms: u64,
    pub max_attempts: u32,
}

impl Default for ScanCfg {
    fn default() -> Self {
        Self {
            retry_ms: 1500,
            max_attempts: 40,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Display {
    /// Fullness reference when the aquarium height is not configured yet
    pub reference_height_cm: f64,
    /// Full scale of the stock gauge
    pub bottle_ml: f64,
    /// Stock below this is flagged low
    pub low_stock_ml: f64,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            reference_height_cm: 20.0,
            bottle_ml: 500.0,
            low_stock_ml: 50.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub device: Device,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub sync: SyncCfg,
    #[serde(default)]
    pub scan: ScanCfg,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse a calibration sheet target: `1`..`n` for dosing channels (returned
/// 0-based), or `drain`/`refill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetTarget {
    Channel(usize),
    Drain,
    Refill,
}

impl std::str::FromStr for SheetTarget {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drain" => Ok(Self::Drain),
            "refill" => Ok(Self::Refill),
            other => {
                let n: usize = other
                    .parse()
                    .map_err(|_| eyre::eyre!("unknown calibration target '{s}'"))?;
                if n == 0 {
                    eyre::bail!("channel numbers start at 1, got 0");
                }
                Ok(Self::Channel(n - 1))
            }
        }
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Vec<(SheetTarget, f64)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["target", "measured_ml"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'target,measured_ml', got: {}",
            actual.join(",")
        );
    }

    let mut out = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        let target: SheetTarget = row
            .target
            .parse()
            .map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        if !(row.measured_ml.is_finite() && row.measured_ml > 0.0) {
            eyre::bail!("invalid CSV row {line}: measured_ml must be > 0");
        }
        out.push((target, row.measured_ml));
    }
    if out.is_empty() {
        eyre::bail!("calibration CSV {:?} has no rows", path);
    }
    Ok(out)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        let url = self.device.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            eyre::bail!("device.base_url must start with http:// or https://");
        }
        for (key, path) in [
            ("device.status_path", &self.device.status_path),
            ("device.events_path", &self.device.events_path),
        ] {
            if !path.starts_with('/') {
                eyre::bail!("{key} must start with '/'");
            }
        }
        if self.device.event_name.trim().is_empty() {
            eyre::bail!("device.event_name must not be empty");
        }

        // Timeouts
        if self.timeouts.connect_ms == 0 {
            eyre::bail!("timeouts.connect_ms must be >= 1");
        }
        if self.timeouts.request_ms == 0 {
            eyre::bail!("timeouts.request_ms must be >= 1");
        }
        if self.timeouts.stream_idle_ms == 0 {
            eyre::bail!("timeouts.stream_idle_ms must be >= 1");
        }

        // Sync
        if self.sync.reconnect_ms == 0 {
            eyre::bail!("sync.reconnect_ms must be >= 1");
        }
        if self.sync.reconnect_ms > 10 * 60 * 1000 {
            eyre::bail!("sync.reconnect_ms is unreasonably large (>10min)");
        }
        if self.sync.queue_depth == 0 {
            eyre::bail!("sync.queue_depth must be >= 1");
        }

        // Scan
        if self.scan.retry_ms == 0 {
            eyre::bail!("scan.retry_ms must be >= 1");
        }
        if self.scan.max_attempts == 0 {
            eyre::bail!("scan.max_attempts must be >= 1");
        }

        // Display
        if !(self.display.reference_height_cm.is_finite() && self.display.reference_height_cm > 0.0)
        {
            eyre::bail!("display.reference_height_cm must be > 0");
        }
        if !(self.display.bottle_ml.is_finite() && self.display.bottle_ml > 0.0) {
            eyre::bail!("display.bottle_ml must be > 0");
        }
        if !(self.display.low_stock_ml.is_finite() && self.display.low_stock_ml >= 0.0) {
            eyre::bail!("display.low_stock_ml must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
