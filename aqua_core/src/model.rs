//! Device status snapshot as pushed and pulled from the controller.
//!
//! Every field is optional on the wire: missing keys take their defaults so a
//! partially populated payload from older firmware still parses. Only a
//! payload that is not a JSON object (or carries a wrongly typed field) fails.
use serde::{Deserialize, Deserializer, Serialize};

/// Dosing channel reserved for the water-change conditioner.
pub const PRIME_CHANNEL: usize = 4;
pub const DAYS_PER_WEEK: usize = 7;
pub const WEEKDAY_NAMES: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Water-change state machine position reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TpaState {
    #[default]
    Idle,
    CanisterOff,
    Draining,
    FillingReservoir,
    DosingPrime,
    Refilling,
    CanisterOn,
    Complete,
    Error,
    /// Any state name this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl TpaState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::CanisterOff => "CANISTER_OFF",
            Self::Draining => "DRAINING",
            Self::FillingReservoir => "FILLING_RESERVOIR",
            Self::DosingPrime => "DOSING_PRIME",
            Self::Refilling => "REFILLING",
            Self::CanisterOn => "CANISTER_ON",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// A water change is in progress (the abort control applies).
    pub const fn is_running(self) -> bool {
        !matches!(self, Self::Idle | Self::Complete | Self::Error | Self::Unknown)
    }
}

impl std::fmt::Display for TpaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub name: String,
    /// Remaining stock in mL
    pub stock: f64,
    /// Per-weekday dose in mL, index 0 = Sunday
    #[serde(deserialize_with = "weekly_doses")]
    pub doses: [f64; DAYS_PER_WEEK],
    #[serde(rename = "sH")]
    pub start_hour: u8,
    #[serde(rename = "sM")]
    pub start_minute: u8,
    /// Calibrated flow rate in mL/s; 0 when uncalibrated
    #[serde(rename = "fR")]
    pub flow_rate: f64,
    pub pwm: u8,
}

impl Channel {
    /// Configured name, or `CH n` (1-based) when the name is blank.
    pub fn display_name(&self, index: usize) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            format!("CH {}", index + 1)
        } else {
            name.to_string()
        }
    }

    pub fn doses_any(&self) -> bool {
        self.doses.iter().any(|d| *d > 0.0)
    }
}

/// Pad or truncate to exactly one dose per weekday; `null` entries read as 0.
fn weekly_doses<'de, D>(de: D) -> Result<[f64; DAYS_PER_WEEK], D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<f64>>> = Option::deserialize(de)?;
    let mut out = [0.0; DAYS_PER_WEEK];
    for (slot, v) in out.iter_mut().zip(raw.unwrap_or_default()) {
        *slot = v.unwrap_or(0.0);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Absent on firmware that does not report station state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_connected: Option<bool>,
    /// Device wall-clock time, display only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Distance from the sensor to the water surface, cm
    pub water_level: f64,
    /// Optical high-water sensor; true means full
    pub optical: bool,
    #[serde(rename = "float")]
    pub float_switch: bool,
    pub emergency: bool,
    pub maintenance: bool,
    /// Canister filter powered
    pub canister: bool,

    pub tpa_state: TpaState,
    /// Days between water changes; 0 disables the schedule
    pub tpa_interval: u32,
    pub tpa_hour: u8,
    pub tpa_minute: u8,
    /// Unix seconds of the last completed water change; 0 when never run
    pub tpa_last_run: i64,
    pub tpa_percent: u8,
    pub tpa_config_ready: bool,
    pub prime_ml: f64,

    pub aq_height: u32,
    pub aq_length: u32,
    pub aq_width: u32,
    pub aq_margin_cm: u32,
    /// Device-computed net volume, L
    pub aquarium_volume: f64,
    pub liters_per_cm: f64,
    pub drain_flow_rate: f64,
    pub refill_flow_rate: f64,
    /// Conditioner mL per litre of new water
    pub prime_ratio: f64,
    /// Reservoir capacity, L
    pub reservoir_volume: f64,
    #[serde(rename = "reservoirSafetyML")]
    pub reservoir_safety_ml: f64,

    pub stocks: Vec<Channel>,
}

impl DeviceStatus {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.stocks.get(index)
    }

    pub fn channel_label(&self, index: usize) -> String {
        self.channel(index)
            .map_or_else(|| format!("CH {}", index + 1), |c| c.display_name(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_takes_defaults() {
        let s = DeviceStatus::from_json("{}").unwrap();
        assert_eq!(s.wifi_connected, None);
        assert_eq!(s.tpa_state, TpaState::Idle);
        assert!(s.stocks.is_empty());
    }

    #[test]
    fn non_object_payload_fails() {
        assert!(DeviceStatus::from_json("[1,2]").is_err());
        assert!(DeviceStatus::from_json("{not json").is_err());
    }

    #[test]
    fn doses_are_normalized_to_a_week() {
        let s = DeviceStatus::from_json(
            r#"{"stocks":[{"name":"","doses":[1,2,null]},{"doses":[1,1,1,1,1,1,1,9]}]}"#,
        )
        .unwrap();
        assert_eq!(s.stocks[0].doses, [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.stocks[1].doses, [1.0; 7]);
        assert_eq!(s.channel_label(0), "CH 1");
        assert_eq!(s.channel_label(9), "CH 10");
    }

    #[test]
    fn wire_names_map() {
        let s = DeviceStatus::from_json(
            r#"{"float":true,"reservoirSafetyML":250,"tpaState":"DOSING_PRIME",
                "stocks":[{"name":"Iron","sH":21,"sM":5,"fR":1.5}]}"#,
        )
        .unwrap();
        assert!(s.float_switch);
        assert_eq!(s.reservoir_safety_ml, 250.0);
        assert_eq!(s.tpa_state, TpaState::DosingPrime);
        assert!(s.tpa_state.is_running());
        let ch = &s.stocks[0];
        assert_eq!((ch.start_hour, ch.start_minute, ch.flow_rate), (21, 5, 1.5));
    }

    #[test]
    fn unknown_state_is_tolerated() {
        let s = DeviceStatus::from_json(r#"{"tpaState":"DEGASSING"}"#).unwrap();
        assert_eq!(s.tpa_state, TpaState::Unknown);
        assert!(!s.tpa_state.is_running());
    }
}
