use std::io::Cursor;
use std::time::Duration;

use aqua_http::{SimulatedDevice, SseReader};
use aqua_traits::{EventStream, Transport};
use rstest::rstest;
use serde_json::{Value, json};

fn post(dev: &SimulatedDevice, path: &str, body: Value) -> Value {
    let resp = dev.post_json(path, Some(&body.to_string())).unwrap();
    serde_json::from_str(&resp.body).unwrap()
}

#[rstest]
#[case("/api/fert/pwm", json!({"channel": 0, "pwm": 300}), "pwm out of range")]
#[case("/api/fert/name", json!({"channel": 0, "name": ""}), "missing name")]
#[case("/api/fert/schedule", json!({"channel": 0, "doses": [1, 2], "hour": 9, "minute": 0}), "doses must have 7 entries")]
#[case("/api/tpa/pump", json!({"pump": "sump", "state": 1}), "invalid pump")]
#[case("/api/stock/reset", json!({"channel": 1, "ml": 0}), "volume must be > 0")]
#[case("/api/schedule", json!({"tpaInterval": 7, "tpaHour": 25}), "schedule value out of range")]
fn refusals_carry_an_error_field(#[case] path: &str, #[case] body: Value, #[case] msg: &str) {
    let dev = SimulatedDevice::new();
    assert_eq!(post(&dev, path, body)["error"], msg);
}

#[test]
fn geometry_is_stored_as_whole_centimetres() {
    let dev = SimulatedDevice::new();
    post(
        &dev,
        "/api/config",
        json!({"aqHeight": 50.4, "aqLength": 60.0, "aqWidth": 30.0, "aqMarginCm": 5.0,
               "primeRatio": 0.05, "reservoirVolume": 20.0}),
    );
    let st = dev.status();
    assert_eq!(st["aqHeight"], json!(50));
    assert_eq!(st["aqMarginCm"], json!(5));
    assert_eq!(st["reservoirVolume"], json!(20.0));
}

#[test]
fn water_change_starts_once_configured() {
    let dev = SimulatedDevice::new();
    assert_eq!(post(&dev, "/api/tpa/start", json!({}))["error"], "TPA config incomplete");
    post(
        &dev,
        "/api/config",
        json!({"aqHeight": 50, "aqLength": 60, "aqWidth": 30, "aqMarginCm": 5,
               "primeRatio": 0.05, "reservoirVolume": 20}),
    );
    assert_eq!(post(&dev, "/api/tpa/start", json!({}))["ok"], true);
    assert_eq!(dev.status()["tpaState"], "CANISTER_OFF");
    post(&dev, "/api/tpa/abort", json!({}));
    assert_eq!(dev.status()["tpaState"], "IDLE");
}

#[test]
fn credentials_need_an_ssid() {
    let dev = SimulatedDevice::new();
    assert_eq!(dev.post_form("/api/wifi", &[("pass", "x")]).unwrap().status, 400);
    assert!(dev.credentials().is_none());
    let ok = dev
        .post_form("/api/wifi", &[("ssid", "Home"), ("pass", "secret")])
        .unwrap();
    assert!(ok.is_success());
    assert_eq!(dev.credentials(), Some(("Home".into(), "secret".into())));
}

#[test]
fn pushes_reflect_commands() {
    let dev = SimulatedDevice::new().with_push_interval(Duration::ZERO);
    let mut stream = dev.subscribe("/events").unwrap();
    let first: Value = serde_json::from_str(&stream.next_event().unwrap().unwrap().data).unwrap();
    assert_eq!(first["maintenance"], false);
    post(&dev, "/api/maintenance", json!({}));
    let second = stream.next_event().unwrap().unwrap();
    assert_eq!(second.event, "status");
    let second: Value = serde_json::from_str(&second.data).unwrap();
    assert_eq!(second["maintenance"], true);
}

#[test]
fn unknown_event_source_is_refused() {
    let dev = SimulatedDevice::new();
    assert!(dev.subscribe("/stream").is_err());
}

#[test]
fn event_stream_framing_over_a_reader() {
    let raw = "retry: 3000\n\nevent: status\ndata: {\"time\":\"10:00:00\"}\n\n: keepalive\n\n";
    let mut r = SseReader::new(Cursor::new(raw.as_bytes().to_vec()));
    let ev = r.next_event().unwrap().unwrap();
    assert_eq!(ev.event, "status");
    assert!(ev.data.contains("10:00:00"));
    assert!(r.next_event().unwrap().is_none());
}
