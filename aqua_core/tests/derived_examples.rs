use aqua_core::calibration::{RunEstimate, flow_rate, run_duration};
use aqua_core::metrics::{self, DerivedMetrics};
use aqua_core::model::DeviceStatus;
use aqua_core::util::SECS_PER_DAY;
use aqua_core::DisplayCfg;

#[test]
fn volume_from_geometry() {
    let v = metrics::aquarium_volume_l(50.0, 60.0, 30.0, 5.0).unwrap();
    assert!((v - 81.0).abs() < 1e-9);
}

#[test]
fn calibrated_run_time() {
    let fr = flow_rate(45.0).unwrap();
    assert!((fr - 15.0).abs() < 1e-12);
    match run_duration(7.5, fr) {
        RunEstimate::Seconds(s) => assert!((s - 0.5).abs() < 1e-12),
        other => panic!("expected seconds, got {other:?}"),
    }
}

#[test]
fn prime_dose_from_reservoir() {
    let ml = metrics::prime_dose_ml(20.0, 0.05).unwrap();
    assert!((ml - 1.0).abs() < 1e-12);
}

#[test]
fn overdue_water_change_is_imminent() {
    let t = 1_700_000_000;
    let p = metrics::next_tpa(7, t, t + 8 * SECS_PER_DAY).unwrap();
    assert_eq!(p.days_until, -1);
    assert!(p.overdue);
    assert!(p.imminent);
}

#[test]
fn snapshot_metrics_bundle() {
    let status = DeviceStatus::from_json(
        r#"{
            "waterLevel": 10, "optical": false,
            "aqHeight": 50, "aqLength": 60, "aqWidth": 30, "aqMarginCm": 5,
            "aquariumVolume": 81.0, "tpaPercent": 20, "tpaInterval": 7,
            "tpaHour": 9, "tpaMinute": 30, "tpaLastRun": 1000, "tpaConfigReady": true,
            "reservoirVolume": 20, "primeRatio": 0.05,
            "stocks": [
                {"name": "Iron", "stock": 40, "doses": [1,1,1,1,1,1,1], "sH": 8, "sM": 0, "fR": 0.5},
                {"name": "", "stock": 500, "doses": [0,0,0,0,0,0,0], "fR": 0},
                {"name": "K", "stock": 100, "doses": [2,0,0,0,0,0,0], "fR": 0},
                {"name": "Mg", "stock": 100, "doses": [0,0,0,0,0,0,0], "fR": 1},
                {"name": "Prime", "stock": 300, "doses": [5,5,5,5,5,5,5], "fR": 1}
            ]
        }"#,
    )
    .unwrap();
    let m = DerivedMetrics::from_snapshot(&status, 1000, &DisplayCfg::default());
    assert_eq!(m.fullness.percent, 80);
    assert!((m.aquarium_volume_l.unwrap() - 81.0).abs() < 1e-9);
    assert!((m.tpa_volume_l.unwrap() - 16.2).abs() < 1e-9);
    assert!((m.prime_dose_ml.unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(m.next_tpa.unwrap().days_until, 7);
    assert!(m.schedule_active);
    assert!(m.tpa_missing.is_empty());
    assert_eq!(m.schedule_summary, "20% every 7 days at 09:30");

    // Uncalibrated channels contribute no pump time
    assert!((m.channels[0].weekly_seconds - 14.0).abs() < 1e-12);
    assert_eq!(m.channels[2].weekly_seconds, 0.0);
    assert!(!m.channels[2].calibrated);
    assert!(m.channels[0].stock.low);

    // Agenda skips idle channels and the conditioner channel
    let agenda: Vec<usize> = m.agenda.iter().map(|r| r.channel).collect();
    assert_eq!(agenda, vec![0, 2]);
    assert_eq!(m.agenda[0].time, "08:00");

    let picks = metrics::selectable_channels(&status);
    assert_eq!(picks.len(), 4);
    assert_eq!(picks[1].1, "CH2 - Channel 2");
    assert!(picks.iter().all(|(i, _)| *i != aqua_core::PRIME_CHANNEL));
}
