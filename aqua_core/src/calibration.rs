//! Flow-rate calibration from a fixed-length test run.
//!
//! Calibrating runs a pump for [`TEST_RUN_SECS`]; the operator measures what
//! came out and the flow rate follows as `measured / TEST_RUN_SECS`.
use crate::dispatcher::{Command, TpaPump};
use crate::error::ValidationError;
use crate::model::DeviceStatus;

/// Length of the device's calibration test run, in seconds.
pub const TEST_RUN_SECS: f64 = 3.0;

/// Flow rate in mL/s for a volume measured after a test run.
pub fn flow_rate(measured_ml: f64) -> Result<f64, ValidationError> {
    if !measured_ml.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "measured_ml",
        });
    }
    if measured_ml <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: "measured_ml",
            value: measured_ml,
        });
    }
    Ok(measured_ml / TEST_RUN_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunEstimate {
    Seconds(f64),
    Uncalibrated,
}

impl RunEstimate {
    pub const fn seconds(self) -> Option<f64> {
        match self {
            Self::Seconds(s) => Some(s),
            Self::Uncalibrated => None,
        }
    }
}

impl std::fmt::Display for RunEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{s:.1}s"),
            Self::Uncalibrated => f.write_str("uncalibrated"),
        }
    }
}

/// Pump run time for `dose_ml` at `flow_rate` mL/s.
///
/// A zero, negative or non-finite rate has never been calibrated.
pub fn run_duration(dose_ml: f64, flow_rate: f64) -> RunEstimate {
    if !(flow_rate.is_finite() && flow_rate > 0.0) || !dose_ml.is_finite() {
        return RunEstimate::Uncalibrated;
    }
    RunEstimate::Seconds(dose_ml.max(0.0) / flow_rate)
}

/// Which pump a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationTarget {
    /// 0-based dosing channel
    Channel(usize),
    Drain,
    Refill,
}

impl CalibrationTarget {
    /// Flow rate the device currently reports for this pump.
    pub fn current_flow_rate(self, status: &DeviceStatus) -> Option<f64> {
        match self {
            Self::Channel(i) => status.channel(i).map(|c| c.flow_rate),
            Self::Drain => Some(status.drain_flow_rate),
            Self::Refill => Some(status.refill_flow_rate),
        }
    }

    /// Submission for a measured test-run volume. The device derives the
    /// rate itself, so the measured volume goes on the wire as-is.
    pub fn command(self, measured_ml: f64) -> Result<Command, ValidationError> {
        flow_rate(measured_ml)?;
        Ok(match self {
            Self::Channel(channel) => Command::CalibrateChannel {
                channel,
                ml: measured_ml,
            },
            Self::Drain => Command::CalibrateTpaPump {
                pump: TpaPump::Drain,
                ml: measured_ml,
            },
            Self::Refill => Command::CalibrateTpaPump {
                pump: TpaPump::Refill,
                ml: measured_ml,
            },
        })
    }
}

impl std::fmt::Display for CalibrationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(i) => write!(f, "channel {}", i + 1),
            Self::Drain => f.write_str("drain pump"),
            Self::Refill => f.write_str("refill pump"),
        }
    }
}

pub trait CalibrationSource {
    fn measurements(&self) -> Vec<(CalibrationTarget, f64)>;
}

/// Measurements loaded from a calibration sheet.
pub struct CsvCalibrationSource {
    data: Vec<(CalibrationTarget, f64)>,
}

impl CsvCalibrationSource {
    pub fn new(data: Vec<(CalibrationTarget, f64)>) -> Self {
        Self { data }
    }

    pub fn from_path(path: &std::path::Path) -> crate::error::Result<Self> {
        let rows = aqua_config::load_calibration_csv(path)?;
        Ok(Self::new(
            rows.into_iter().map(|(t, ml)| (t.into(), ml)).collect(),
        ))
    }
}

impl CalibrationSource for CsvCalibrationSource {
    fn measurements(&self) -> Vec<(CalibrationTarget, f64)> {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_rate_divides_by_test_run() {
        let fr = flow_rate(4.5).unwrap();
        assert!((fr - 1.5).abs() < 1e-12);
        assert!(matches!(
            flow_rate(0.0),
            Err(ValidationError::NotPositive { .. })
        ));
        assert!(matches!(
            flow_rate(f64::NAN),
            Err(ValidationError::NotFinite { .. })
        ));
    }

    #[test]
    fn run_duration_needs_calibration() {
        assert_eq!(run_duration(3.0, 1.5), RunEstimate::Seconds(2.0));
        assert_eq!(run_duration(3.0, 0.0), RunEstimate::Uncalibrated);
        assert_eq!(run_duration(3.0, -1.0).to_string(), "uncalibrated");
        assert_eq!(run_duration(3.0, 1.5).to_string(), "2.0s");
    }

    #[test]
    fn calibration_commands_carry_measured_volume() {
        let cmd = CalibrationTarget::Channel(2).command(4.5).unwrap();
        assert_eq!(cmd, Command::CalibrateChannel { channel: 2, ml: 4.5 });
        assert!(CalibrationTarget::Drain.command(-1.0).is_err());
    }
}
