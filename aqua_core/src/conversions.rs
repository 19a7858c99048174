//! `From` implementations bridging `aqua_config` types to `aqua_core` types.

use crate::calibration::CalibrationTarget;
use crate::config::{DisplayCfg, ScanCfg, SyncCfg};
use crate::util::ms;

// ── SyncCfg ──────────────────────────────────────────────────────────────────

impl From<&aqua_config::Config> for SyncCfg {
    fn from(c: &aqua_config::Config) -> Self {
        Self {
            status_path: c.device.status_path.clone(),
            events_path: c.device.events_path.clone(),
            event_name: c.device.event_name.clone(),
            reconnect: ms(c.sync.reconnect_ms),
            fallback_poll: c.sync.fallback_poll,
            queue_depth: c.sync.queue_depth.max(1),
        }
    }
}

// ── ScanCfg ──────────────────────────────────────────────────────────────────

impl From<&aqua_config::ScanCfg> for ScanCfg {
    fn from(c: &aqua_config::ScanCfg) -> Self {
        Self {
            retry: ms(c.retry_ms),
            max_attempts: c.max_attempts.max(1),
            ..Self::default()
        }
    }
}

// ── DisplayCfg ───────────────────────────────────────────────────────────────

impl From<&aqua_config::Display> for DisplayCfg {
    fn from(c: &aqua_config::Display) -> Self {
        Self {
            reference_height_cm: c.reference_height_cm,
            bottle_ml: c.bottle_ml,
            low_stock_ml: c.low_stock_ml,
        }
    }
}

// ── CalibrationTarget ────────────────────────────────────────────────────────

impl From<aqua_config::SheetTarget> for CalibrationTarget {
    fn from(t: aqua_config::SheetTarget) -> Self {
        match t {
            aqua_config::SheetTarget::Channel(i) => Self::Channel(i),
            aqua_config::SheetTarget::Drain => Self::Drain,
            aqua_config::SheetTarget::Refill => Self::Refill,
        }
    }
}
