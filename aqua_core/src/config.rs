use std::time::Duration;

/// Where and how the sync channel talks to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCfg {
    pub status_path: String,
    pub events_path: String,
    /// Push events with any other name are ignored
    pub event_name: String,
    pub reconnect: Duration,
    /// Pull once per reconnect attempt while the push stream is down
    pub fallback_poll: bool,
    pub queue_depth: usize,
}

impl Default for SyncCfg {
    fn default() -> Self {
        Self {
            status_path: "/api/status".into(),
            events_path: "/events".into(),
            event_name: "status".into(),
            reconnect: Duration::from_secs(3),
            fallback_poll: false,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCfg {
    pub path: String,
    /// Wait between polls while the device reports the scan in progress
    pub retry: Duration,
    pub max_attempts: u32,
}

impl Default for ScanCfg {
    fn default() -> Self {
        Self {
            path: "/api/wifi/scan".into(),
            retry: Duration::from_millis(1500),
            max_attempts: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayCfg {
    pub reference_height_cm: f64,
    pub bottle_ml: f64,
    pub low_stock_ml: f64,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            reference_height_cm: 20.0,
            bottle_ml: 500.0,
            low_stock_ml: 50.0,
        }
    }
}
