//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "aqua", version, about = "Aquarium controller client")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/aqua_config.toml")]
    pub config: PathBuf,

    /// Controller base URL; overrides device.base_url and makes the config file optional
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Talk to an in-memory simulated controller instead of the network
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Output and log as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Pump {
    Drain,
    Refill,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Args, Debug, Clone, Copy)]
pub struct TimeOfDay {
    /// Hour of day (0-23)
    #[arg(long)]
    pub hour: u8,
    /// Minute (0-59)
    #[arg(long, default_value_t = 0)]
    pub minute: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the current status once and print it with derived values
    Status,
    /// Follow live status pushes until Ctrl-C
    Watch {
        /// Stop after this many applied snapshots
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },
    /// Check that the controller answers
    Health,
    /// Partial water change (TPA) controls
    #[command(subcommand)]
    Tpa(TpaCmd),
    /// Fertilizer dosing channels
    #[command(subcommand)]
    Fert(FertCmd),
    /// Set tank geometry and conditioner settings
    Aquarium {
        #[arg(long, value_name = "CM")]
        height: f64,
        #[arg(long, value_name = "CM")]
        length: f64,
        #[arg(long, value_name = "CM")]
        width: f64,
        /// Distance from the rim to the water line
        #[arg(long, value_name = "CM", default_value_t = 0.0)]
        margin: f64,
        /// Conditioner mL per litre of new water
        #[arg(long, value_name = "ML_PER_L", default_value_t = 0.0)]
        prime_ratio: f64,
        /// Reservoir capacity in litres
        #[arg(long, value_name = "L", default_value_t = 0.0)]
        reservoir: f64,
    },
    /// Toggle maintenance mode
    Maintenance,
    /// Stop every pump immediately
    EmergencyStop,
    /// Submit several calibrations from a CSV sheet (headers: target,measured_ml)
    CalibrateSheet {
        #[arg(long, value_name = "CSV")]
        file: PathBuf,
    },
    /// Scan for wireless networks
    Scan,
    /// Send station credentials; the controller restarts to join
    Wifi {
        #[arg(long)]
        ssid: String,
        #[arg(long, default_value = "")]
        pass: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TpaCmd {
    /// Run every N days (0 disables)
    Schedule {
        #[arg(long, value_name = "DAYS")]
        interval: u32,
        #[command(flatten)]
        at: TimeOfDay,
        /// Share of the aquarium volume to exchange
        #[arg(long, default_value_t = 20)]
        percent: u8,
    },
    /// Run weekly on a weekday (0 = Sunday)
    Weekday {
        #[arg(long)]
        day: u8,
        #[command(flatten)]
        at: TimeOfDay,
    },
    /// Reservoir volume kept back as a safety margin
    Safety {
        #[arg(long, value_name = "ML")]
        ml: f64,
    },
    /// Switch a water-change pump
    Pump {
        #[arg(value_enum)]
        pump: Pump,
        #[arg(value_enum)]
        state: Switch,
    },
    /// Run a pump for the fixed calibration interval
    TestRun {
        #[arg(value_enum)]
        pump: Pump,
    },
    /// Submit the volume measured after a test run
    Calibrate {
        #[arg(value_enum)]
        pump: Pump,
        #[arg(long, value_name = "ML")]
        ml: f64,
    },
    /// Start a water change now
    Start,
    /// Abort a running water change
    Abort,
}

#[derive(Subcommand, Debug)]
pub enum FertCmd {
    /// Rename a channel
    Name {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(long)]
        name: String,
    },
    /// Set pump PWM duty (0-255)
    Pwm {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(long)]
        pwm: u8,
    },
    /// Switch a dosing pump
    Pump {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(value_enum)]
        state: Switch,
    },
    /// Run a pump for the fixed calibration interval
    TestRun {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
    },
    /// Submit the volume measured after a test run
    Calibrate {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(long, value_name = "ML")]
        ml: f64,
    },
    /// Record a refilled bottle
    ResetStock {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(long, value_name = "ML")]
        ml: f64,
    },
    /// Set the weekly doses (Sun..Sat, comma separated mL) and start time
    Schedule {
        /// Channel number as shown on the device (1-based)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        channel: u16,
        #[arg(long, value_delimiter = ',', value_name = "ML,..")]
        doses: Vec<f64>,
        #[command(flatten)]
        at: TimeOfDay,
    },
    /// Show the weekly dosing agenda
    Agenda,
}
