//! Values derived from a status snapshot for display.
//!
//! Everything here is a pure function of its inputs; `DerivedMetrics`
//! bundles them for one snapshot at one instant. Absent results are `None`
//! and render as `--`.
use serde::Serialize;

use crate::calibration::run_duration;
use crate::config::DisplayCfg;
use crate::model::{DAYS_PER_WEEK, DeviceStatus, PRIME_CHANNEL};
use crate::util::{SECS_PER_DAY, ceil_div_i64, hh_mm};

pub const PLACEHOLDER: &str = "--";

/// Format an optional value with `decimals` places, or the placeholder.
pub fn or_dash(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| PLACEHOLDER.to_string(), |x| format!("{x:.decimals$}"))
}

fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

/// Net water volume in litres between the floor and `margin_cm` below the rim.
pub fn aquarium_volume_l(height_cm: f64, length_cm: f64, width_cm: f64, margin_cm: f64) -> Option<f64> {
    positive((height_cm - margin_cm) * length_cm * width_cm / 1000.0)
}

/// Litres per centimetre of water depth.
pub fn liters_per_cm(length_cm: f64, width_cm: f64) -> Option<f64> {
    positive(length_cm * width_cm / 1000.0)
}

/// Conditioner volume for a full reservoir; absent while either input is unset.
pub fn prime_dose_ml(reservoir_l: f64, prime_ratio: f64) -> Option<f64> {
    if reservoir_l == 0.0 || prime_ratio == 0.0 {
        return None;
    }
    positive(reservoir_l * prime_ratio)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelTier {
    Critical,
    Warning,
    Nominal,
}

impl LevelTier {
    pub const fn from_percent(pct: u8) -> Self {
        if pct < 25 {
            Self::Critical
        } else if pct < 50 {
            Self::Warning
        } else {
            Self::Nominal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fullness {
    pub percent: u8,
    pub tier: LevelTier,
    /// The optical sensor reported full and overrode the distance reading
    pub sensor_override: bool,
}

/// Fill level in percent from the distance to the surface.
///
/// `reference_cm` is the tank height, or `fallback_cm` while it is unset. A
/// non-finite distance reads as 0%.
pub fn fullness(optical: bool, water_level_cm: f64, reference_cm: f64, fallback_cm: f64) -> Fullness {
    if optical {
        return Fullness {
            percent: 100,
            tier: LevelTier::Nominal,
            sensor_override: true,
        };
    }
    let reference = if reference_cm > 0.0 { reference_cm } else { fallback_cm };
    let raw = ((1.0 - water_level_cm / reference) * 100.0).round();
    let percent = if raw.is_finite() {
        raw.clamp(0.0, 100.0) as u8
    } else {
        0
    };
    Fullness {
        percent,
        tier: LevelTier::from_percent(percent),
        sensor_override: false,
    }
}

/// Distance-to-rim warning band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadroomTier {
    Overflow,
    Close,
    Clear,
}

impl HeadroomTier {
    pub fn from_distance(cm: f64) -> Self {
        if cm < 5.0 {
            Self::Overflow
        } else if cm < 10.0 {
            Self::Close
        } else {
            Self::Clear
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TpaProjection {
    /// Unix seconds
    pub next_run: i64,
    /// Whole days remaining, rounded up
    pub days_until: i64,
    pub imminent: bool,
    pub overdue: bool,
}

/// Next scheduled water change; absent when it has never run or the
/// schedule is disabled.
pub fn next_tpa(interval_days: u32, last_run: i64, now: i64) -> Option<TpaProjection> {
    if interval_days == 0 || last_run <= 0 {
        return None;
    }
    let next_run = last_run.saturating_add(i64::from(interval_days) * SECS_PER_DAY);
    let days_until = ceil_div_i64(next_run.saturating_sub(now), SECS_PER_DAY);
    Some(TpaProjection {
        next_run,
        days_until,
        imminent: days_until <= 1,
        overdue: next_run <= now,
    })
}

/// Litres exchanged by one water change.
pub fn tpa_volume_l(volume_l: f64, percent: u8) -> Option<f64> {
    positive(volume_l).map(|v| v * f64::from(percent) / 100.0)
}

/// Pump seconds per weekday; all zero while uncalibrated.
pub fn dose_seconds_by_day(doses: &[f64; DAYS_PER_WEEK], flow_rate: f64) -> [f64; DAYS_PER_WEEK] {
    let mut out = [0.0; DAYS_PER_WEEK];
    for (slot, dose) in out.iter_mut().zip(doses) {
        *slot = run_duration(*dose, flow_rate).seconds().unwrap_or(0.0);
    }
    out
}

pub fn weekly_dose_seconds(doses: &[f64; DAYS_PER_WEEK], flow_rate: f64) -> f64 {
    dose_seconds_by_day(doses, flow_rate).iter().sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StockGauge {
    /// Percent of a full bottle, capped at 100
    pub percent: f64,
    pub low: bool,
}

pub fn stock_gauge(stock_ml: f64, bottle_ml: f64, low_ml: f64) -> StockGauge {
    let percent = if bottle_ml > 0.0 && stock_ml.is_finite() {
        (stock_ml.max(0.0) / bottle_ml * 100.0).min(100.0)
    } else {
        0.0
    };
    StockGauge {
        percent,
        low: stock_ml < low_ml,
    }
}

/// A water-change prerequisite the controller still lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TpaRequirement {
    Dimensions,
    ReservoirVolume,
    Percent,
}

impl std::fmt::Display for TpaRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Dimensions => "aquarium dimensions",
            Self::ReservoirVolume => "reservoir volume",
            Self::Percent => "water change percent",
        })
    }
}

pub fn missing_tpa_requirements(status: &DeviceStatus) -> Vec<TpaRequirement> {
    let mut missing = Vec::new();
    if status.aq_height == 0 || status.aq_length == 0 || status.aq_width == 0 {
        missing.push(TpaRequirement::Dimensions);
    }
    if status.reservoir_volume <= 0.0 {
        missing.push(TpaRequirement::ReservoirVolume);
    }
    if status.tpa_percent == 0 {
        missing.push(TpaRequirement::Percent);
    }
    missing
}

/// The device will run water changes on its own. Both the device flag and
/// the local check must agree.
pub fn schedule_active(status: &DeviceStatus) -> bool {
    status.tpa_config_ready
        && status.tpa_interval > 0
        && missing_tpa_requirements(status).is_empty()
}

pub fn describe_tpa_schedule(interval_days: u32, percent: u8, hour: u8, minute: u8) -> String {
    if interval_days == 0 {
        return "disabled".to_string();
    }
    let unit = if interval_days == 1 { "day" } else { "days" };
    format!(
        "{percent}% every {interval_days} {unit} at {}",
        hh_mm(hour, minute)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgendaRow {
    pub channel: usize,
    pub label: String,
    pub time: String,
    pub doses: [f64; DAYS_PER_WEEK],
}

/// Channels that dose on at least one weekday. The conditioner channel is
/// dosed by the water change, not the week plan.
pub fn weekly_agenda(status: &DeviceStatus) -> Vec<AgendaRow> {
    status
        .stocks
        .iter()
        .enumerate()
        .filter(|(i, ch)| *i != PRIME_CHANNEL && ch.doses_any())
        .map(|(i, ch)| AgendaRow {
            channel: i,
            label: ch.display_name(i),
            time: hh_mm(ch.start_hour, ch.start_minute),
            doses: ch.doses,
        })
        .collect()
}

/// Channels an operator can pick for dosing edits, as `(index, label)`.
pub fn selectable_channels(status: &DeviceStatus) -> Vec<(usize, String)> {
    status
        .stocks
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != PRIME_CHANNEL)
        .map(|(i, ch)| {
            let name = ch.name.trim();
            let name = if name.is_empty() {
                format!("Channel {}", i + 1)
            } else {
                name.to_string()
            };
            (i, format!("CH{} - {name}", i + 1))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMetrics {
    pub channel: usize,
    pub label: String,
    pub calibrated: bool,
    pub seconds_by_day: [f64; DAYS_PER_WEEK],
    pub weekly_seconds: f64,
    pub weekly_ml: f64,
    pub stock: StockGauge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub aquarium_volume_l: Option<f64>,
    pub liters_per_cm: Option<f64>,
    pub prime_dose_ml: Option<f64>,
    pub fullness: Fullness,
    pub headroom: HeadroomTier,
    pub next_tpa: Option<TpaProjection>,
    pub tpa_volume_l: Option<f64>,
    pub tpa_missing: Vec<TpaRequirement>,
    pub schedule_active: bool,
    pub schedule_summary: String,
    pub channels: Vec<ChannelMetrics>,
    pub agenda: Vec<AgendaRow>,
}

impl DerivedMetrics {
    /// Derive everything for `status` as of unix time `now`.
    pub fn from_snapshot(status: &DeviceStatus, now: i64, cfg: &DisplayCfg) -> Self {
        let channels = status
            .stocks
            .iter()
            .enumerate()
            .map(|(i, ch)| ChannelMetrics {
                channel: i,
                label: ch.display_name(i),
                calibrated: ch.flow_rate > 0.0,
                seconds_by_day: dose_seconds_by_day(&ch.doses, ch.flow_rate),
                weekly_seconds: weekly_dose_seconds(&ch.doses, ch.flow_rate),
                weekly_ml: ch.doses.iter().sum(),
                stock: stock_gauge(ch.stock, cfg.bottle_ml, cfg.low_stock_ml),
            })
            .collect();
        Self {
            aquarium_volume_l: aquarium_volume_l(
                f64::from(status.aq_height),
                f64::from(status.aq_length),
                f64::from(status.aq_width),
                f64::from(status.aq_margin_cm),
            ),
            liters_per_cm: liters_per_cm(f64::from(status.aq_length), f64::from(status.aq_width)),
            prime_dose_ml: prime_dose_ml(status.reservoir_volume, status.prime_ratio),
            fullness: fullness(
                status.optical,
                status.water_level,
                f64::from(status.aq_height),
                cfg.reference_height_cm,
            ),
            headroom: HeadroomTier::from_distance(status.water_level),
            next_tpa: next_tpa(status.tpa_interval, status.tpa_last_run, now),
            tpa_volume_l: tpa_volume_l(status.aquarium_volume, status.tpa_percent),
            tpa_missing: missing_tpa_requirements(status),
            schedule_active: schedule_active(status),
            schedule_summary: describe_tpa_schedule(
                status.tpa_interval,
                status.tpa_percent,
                status.tpa_hour,
                status.tpa_minute,
            ),
            channels,
            agenda: weekly_agenda(status),
        }
    }
}
