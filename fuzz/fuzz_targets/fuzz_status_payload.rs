#![no_main]
use aqua_core::{DerivedMetrics, DeviceStatus, DisplayCfg};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Whatever the device pushes, decoding and deriving must not panic.
    if let Ok(status) = DeviceStatus::from_json(data) {
        let _ = DerivedMetrics::from_snapshot(&status, 1_700_000_000, &DisplayCfg::default());
    }
});
