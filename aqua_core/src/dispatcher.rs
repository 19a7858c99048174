//! Fire-and-forget command submission.
//!
//! Each operator action maps to one POST. Nothing is applied locally: the
//! next status push is what shows the effect. A top-level `error` field in
//! the reply goes to the operator through the [`ErrorBus`]; transport
//! failures are only logged.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aqua_traits::Transport;
use crossbeam_channel as xch;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{AquaError, ValidationError};
use crate::events::{ErrorBus, ErrorEvent};
use crate::model::{DAYS_PER_WEEK, PRIME_CHANNEL};
use crate::transport_error::map_transport_error;

pub const WIFI_PATH: &str = "/api/wifi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TpaPump {
    Drain,
    Refill,
}

impl TpaPump {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drain => "drain",
            Self::Refill => "refill",
        }
    }
}

/// Tank geometry and water-change chemistry, submitted together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AquariumConfig {
    pub aq_height: f64,
    pub aq_length: f64,
    pub aq_width: f64,
    pub aq_margin_cm: f64,
    pub prime_ratio: f64,
    pub reservoir_volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Every `interval_days` at `hour:minute`, changing `percent` of the volume
    TpaSchedule {
        interval_days: u32,
        hour: u8,
        minute: u8,
        percent: u8,
    },
    /// Weekly water change on `day` (0 = Sunday)
    TpaWeekday { day: u8, hour: u8, minute: u8 },
    TpaSafety { reservoir_safety_ml: f64 },
    TpaPumpSwitch { pump: TpaPump, on: bool },
    TpaTestRun { pump: TpaPump },
    CalibrateTpaPump { pump: TpaPump, ml: f64 },
    StartTpa,
    AbortTpa,
    RenameChannel { channel: usize, name: String },
    SetPwm { channel: usize, pwm: u8 },
    ChannelPump { channel: usize, on: bool },
    ChannelTestRun { channel: usize },
    CalibrateChannel { channel: usize, ml: f64 },
    ResetStock { channel: usize, ml: f64 },
    ChannelSchedule {
        channel: usize,
        doses: [f64; DAYS_PER_WEEK],
        hour: u8,
        minute: u8,
    },
    Aquarium(AquariumConfig),
    ToggleMaintenance,
    EmergencyStop,
}

fn range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn time_of_day(hour: u8, minute: u8) -> Result<(), ValidationError> {
    range("hour", i64::from(hour), 0, 23)?;
    range("minute", i64::from(minute), 0, 59)
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

fn on_off(on: bool) -> u8 {
    u8::from(on)
}

impl Command {
    pub const fn path(&self) -> &'static str {
        match self {
            Self::TpaSchedule { .. } | Self::TpaWeekday { .. } => "/api/schedule",
            Self::TpaSafety { .. } => "/api/tpa/config",
            Self::TpaPumpSwitch { .. } => "/api/tpa/pump",
            Self::TpaTestRun { .. } => "/api/tpa/run3s",
            Self::CalibrateTpaPump { .. } => "/api/tpa/calibrate",
            Self::StartTpa => "/api/tpa/start",
            Self::AbortTpa => "/api/tpa/abort",
            Self::RenameChannel { .. } => "/api/fert/name",
            Self::SetPwm { .. } => "/api/fert/pwm",
            Self::ChannelPump { .. } => "/api/fert/pump",
            Self::ChannelTestRun { .. } => "/api/fert/run3s",
            Self::CalibrateChannel { .. } => "/api/fert/calibrate",
            Self::ResetStock { .. } => "/api/stock/reset",
            Self::ChannelSchedule { .. } => "/api/fert/schedule",
            Self::Aquarium(_) => "/api/config",
            Self::ToggleMaintenance => "/api/maintenance",
            Self::EmergencyStop => "/api/emergency/stop",
        }
    }

    /// Short label used as the error context, e.g. `fert/calibrate`.
    pub fn label(&self) -> &'static str {
        self.path().trim_start_matches("/api/")
    }

    /// JSON body, or `None` for commands posted without one.
    pub fn body(&self) -> Option<Value> {
        let body = match self {
            Self::TpaSchedule {
                interval_days,
                hour,
                minute,
                percent,
            } => json!({
                "tpaInterval": interval_days,
                "tpaHour": hour,
                "tpaMinute": minute,
                "tpaPercent": percent,
            }),
            Self::TpaWeekday { day, hour, minute } => json!({
                "tpaDay": day,
                "tpaHour": hour,
                "tpaMinute": minute,
            }),
            Self::TpaSafety {
                reservoir_safety_ml,
            } => json!({ "reservoirSafetyML": reservoir_safety_ml }),
            Self::TpaPumpSwitch { pump, on } => json!({ "pump": pump, "state": on_off(*on) }),
            Self::TpaTestRun { pump } => json!({ "pump": pump }),
            Self::CalibrateTpaPump { pump, ml } => json!({ "pump": pump, "ml": ml }),
            Self::RenameChannel { channel, name } => {
                json!({ "channel": channel, "name": name.trim() })
            }
            Self::SetPwm { channel, pwm } => json!({ "channel": channel, "pwm": pwm }),
            Self::ChannelPump { channel, on } => {
                json!({ "channel": channel, "state": on_off(*on) })
            }
            Self::ChannelTestRun { channel } => json!({ "channel": channel }),
            Self::CalibrateChannel { channel, ml } | Self::ResetStock { channel, ml } => {
                json!({ "channel": channel, "ml": ml })
            }
            Self::ChannelSchedule {
                channel,
                doses,
                hour,
                minute,
            } => json!({
                "channel": channel,
                "doses": doses,
                "hour": hour,
                "minute": minute,
            }),
            Self::Aquarium(cfg) => json!(cfg),
            Self::StartTpa | Self::AbortTpa | Self::ToggleMaintenance | Self::EmergencyStop => {
                return None;
            }
        };
        Some(body)
    }

    /// Reject input the device could never accept, before anything is sent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::TpaSchedule {
                interval_days,
                hour,
                minute,
                percent,
            } => {
                range("interval_days", i64::from(*interval_days), 0, 90)?;
                range("percent", i64::from(*percent), 1, 100)?;
                time_of_day(*hour, *minute)
            }
            Self::TpaWeekday { day, hour, minute } => {
                range("day", i64::from(*day), 0, 6)?;
                time_of_day(*hour, *minute)
            }
            Self::TpaSafety {
                reservoir_safety_ml,
            } => non_negative("reservoir_safety_ml", *reservoir_safety_ml),
            Self::CalibrateTpaPump { ml, .. }
            | Self::CalibrateChannel { ml, .. }
            | Self::ResetStock { ml, .. } => positive("ml", *ml),
            Self::RenameChannel { name, .. } => {
                if name.trim().is_empty() {
                    Err(ValidationError::Empty { field: "name" })
                } else {
                    Ok(())
                }
            }
            Self::ChannelSchedule {
                channel,
                doses,
                hour,
                minute,
            } => {
                if *channel == PRIME_CHANNEL {
                    return Err(ValidationError::ReservedChannel { channel: *channel });
                }
                for d in doses {
                    non_negative("dose", *d)?;
                }
                time_of_day(*hour, *minute)
            }
            Self::Aquarium(cfg) => {
                non_negative("aq_height", cfg.aq_height)?;
                non_negative("aq_length", cfg.aq_length)?;
                non_negative("aq_width", cfg.aq_width)?;
                non_negative("aq_margin_cm", cfg.aq_margin_cm)?;
                non_negative("prime_ratio", cfg.prime_ratio)?;
                non_negative("reservoir_volume", cfg.reservoir_volume)
            }
            Self::TpaPumpSwitch { .. }
            | Self::TpaTestRun { .. }
            | Self::StartTpa
            | Self::AbortTpa
            | Self::SetPwm { .. }
            | Self::ChannelPump { .. }
            | Self::ChannelTestRun { .. }
            | Self::ToggleMaintenance
            | Self::EmergencyStop => Ok(()),
        }
    }
}

/// What became of a sent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered and not refused; the effect shows in a later push
    Accepted,
    /// The device replied with an `error` field
    Rejected(String),
    /// No usable reply: network failure or an unreadable response
    Failed(String),
}

impl Outcome {
    /// Classify a reply. The `error` field wins regardless of HTTP status.
    pub fn from_response(resp: &aqua_traits::Response) -> Self {
        let parsed: Option<Value> = serde_json::from_str(&resp.body).ok();
        if let Some(msg) = parsed
            .as_ref()
            .and_then(|v| v.get("error"))
            .filter(|e| !e.is_null())
        {
            let text = msg
                .as_str()
                .map_or_else(|| msg.to_string(), str::to_string);
            return Self::Rejected(text);
        }
        if !resp.is_success() {
            return Self::Failed(format!("HTTP {}", resp.status));
        }
        if parsed.is_none() && !resp.body.trim().is_empty() {
            return Self::Failed("unreadable reply".into());
        }
        Self::Accepted
    }
}

/// A command in flight on its own thread.
pub struct PendingCommand {
    rx: xch::Receiver<Outcome>,
}

impl PendingCommand {
    /// Block up to `timeout` for the outcome.
    pub fn wait(&self, timeout: Duration) -> Option<Outcome> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_outcome(&self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }
}

pub struct CommandDispatcher<T> {
    transport: Arc<T>,
    errors: ErrorBus,
    /// Cleared when the session ends; late results are then discarded.
    open: Arc<AtomicBool>,
}

impl<T> Clone for CommandDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            errors: self.errors.clone(),
            open: Arc::clone(&self.open),
        }
    }
}

impl<T> CommandDispatcher<T> {
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}

impl<T: Transport + Send + Sync + 'static> CommandDispatcher<T> {
    pub fn new(transport: Arc<T>, errors: ErrorBus) -> Self {
        Self {
            transport,
            errors,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Validate, send and wait for the reply on the calling thread.
    pub fn send(&self, cmd: &Command) -> Result<Outcome, ValidationError> {
        cmd.validate()?;
        Ok(execute(&*self.transport, &self.errors, &self.open, cmd))
    }

    /// Validate now, then send on a background thread.
    pub fn dispatch(&self, cmd: Command) -> Result<PendingCommand, ValidationError> {
        cmd.validate()?;
        let (tx, rx) = xch::bounded(1);
        let transport = Arc::clone(&self.transport);
        let errors = self.errors.clone();
        let open = Arc::clone(&self.open);
        std::thread::spawn(move || {
            let outcome = execute(&*transport, &errors, &open, &cmd);
            // Receiver may be gone; the outcome is already logged.
            let _ = tx.send(outcome);
        });
        Ok(PendingCommand { rx })
    }

    /// Submit station credentials as a form. Success means the device
    /// answered 2xx; it reboots to join the network afterwards.
    pub fn provision_wifi(&self, ssid: &str, pass: &str) -> Result<(), AquaError> {
        if ssid.trim().is_empty() {
            return Err(ValidationError::Empty { field: "ssid" }.into());
        }
        let result = match self
            .transport
            .post_form(WIFI_PATH, &[("ssid", ssid), ("pass", pass)])
        {
            Ok(resp) if resp.is_success() => {
                tracing::info!(ssid, "network credentials accepted");
                return Ok(());
            }
            Ok(resp) => AquaError::Device(format!(
                "credentials refused with HTTP {}",
                resp.status
            )),
            Err(e) => map_transport_error(e.as_ref()),
        };
        if self.is_open() {
            self.errors
                .publish(ErrorEvent::new("wifi", result.to_string()));
        }
        Err(result)
    }
}

fn execute<T: Transport + ?Sized>(
    transport: &T,
    errors: &ErrorBus,
    open: &AtomicBool,
    cmd: &Command,
) -> Outcome {
    let body = cmd.body().map(|b| b.to_string());
    let label = cmd.label();
    tracing::debug!(command = label, body = body.as_deref().unwrap_or(""), "send");
    let outcome = match transport.post_json(cmd.path(), body.as_deref()) {
        Ok(resp) => Outcome::from_response(&resp),
        Err(e) => Outcome::Failed(map_transport_error(e.as_ref()).to_string()),
    };
    if !open.load(Ordering::Relaxed) {
        tracing::debug!(command = label, "session closed; discarding outcome");
        return outcome;
    }
    match &outcome {
        Outcome::Accepted => tracing::info!(command = label, "accepted"),
        Outcome::Rejected(msg) => errors.publish(ErrorEvent::new(label, msg.clone())),
        Outcome::Failed(reason) => tracing::error!(command = label, %reason, "command failed"),
    }
    outcome
}
