//! In-memory controller speaking the same HTTP API as the device.
//!
//! State is kept as a JSON document shaped like the device's status payload;
//! commands mutate it the way the firmware would and the push stream re-emits
//! it. Nothing here is persisted.
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use aqua_traits::{BoxError, EventStream, Response, ServerEvent, Transport};
use serde_json::{Value, json};

/// Fixed-duration test run enforced by the firmware.
const TEST_RUN_SECS: f64 = 3.0;
const CHANNELS: usize = 5;

struct Shared {
    state: Mutex<Value>,
    scans_pending: AtomicU32,
    pushes: AtomicUsize,
    credentials: Mutex<Option<(String, String)>>,
}

#[derive(Clone)]
pub struct SimulatedDevice {
    shared: Arc<Shared>,
    push_interval: Duration,
    push_limit: Option<usize>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        let stocks: Vec<Value> = (0..CHANNELS)
            .map(|i| {
                json!({
                    "name": if i == 4 { "Prime".to_string() } else { format!("Fert {}", i + 1) },
                    "stock": 500.0,
                    "doses": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                    "sH": 9, "sM": 0, "fR": 0.0, "pwm": 255
                })
            })
            .collect();
        let state = json!({
            "wifiConnected": true,
            "time": "12:00:00",
            "waterLevel": 8.0,
            "optical": false,
            "float": true,
            "emergency": false,
            "maintenance": false,
            "canister": true,
            "tpaState": "IDLE",
            "tpaInterval": 0, "tpaHour": 10, "tpaMinute": 0,
            "tpaLastRun": 0, "tpaPercent": 20, "tpaConfigReady": false,
            "primeMl": 0.0,
            "aqHeight": 0, "aqLength": 0, "aqWidth": 0, "aqMarginCm": 0,
            "aquariumVolume": 0.0, "litersPerCm": 0.0,
            "drainFlowRate": 0.0, "refillFlowRate": 0.0,
            "primeRatio": 0.0, "reservoirVolume": 0.0, "reservoirSafetyML": 0.0,
            "stocks": stocks,
        });
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                scans_pending: AtomicU32::new(2),
                pushes: AtomicUsize::new(0),
                credentials: Mutex::new(None),
            }),
            push_interval: Duration::from_secs(2),
            push_limit: None,
        }
    }

    /// How often the push stream re-emits status.
    pub fn with_push_interval(mut self, d: Duration) -> Self {
        self.push_interval = d;
        self
    }

    /// Close each push stream after `n` events.
    pub fn with_push_limit(mut self, n: usize) -> Self {
        self.push_limit = Some(n);
        self
    }

    /// Number of "in progress" answers before a scan completes.
    pub fn with_pending_scans(self, n: u32) -> Self {
        self.shared.scans_pending.store(n, Ordering::Relaxed);
        self
    }

    /// Override a top-level status field, e.g. `wifiConnected`.
    pub fn set_field(&self, key: &str, value: Value) {
        self.lock()[key] = value;
    }

    pub fn status(&self) -> Value {
        self.lock().clone()
    }

    /// Credentials accepted by the last network provisioning call.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.shared
            .credentials
            .lock()
            .map(|g| g.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn pushes_sent(&self) -> usize {
        self.shared.pushes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn handle_post(&self, path: &str, body: &Value) -> Response {
        let mut guard = self.lock();
        let st: &mut Value = &mut guard;
        let outcome = match path {
            "/api/schedule" => apply_schedule(st, body),
            "/api/fert/name" => with_channel(st, body, |ch| {
                let name = str_field(body, "name").ok_or("missing name")?;
                ch["name"] = json!(name);
                Ok(())
            }),
            "/api/fert/pwm" => with_channel(st, body, |ch| {
                let pwm = num(body, "pwm").ok_or("missing pwm")?;
                if !(0.0..=255.0).contains(&pwm) {
                    return Err("pwm out of range");
                }
                ch["pwm"] = json!(pwm as u8);
                Ok(())
            }),
            "/api/fert/pump" => with_channel(st, body, |_| Ok(())),
            "/api/fert/run3s" => with_channel(st, body, |ch| {
                let used = ch["fR"].as_f64().unwrap_or(0.0) * TEST_RUN_SECS;
                let left = (ch["stock"].as_f64().unwrap_or(0.0) - used).max(0.0);
                ch["stock"] = json!(left);
                Ok(())
            }),
            "/api/fert/calibrate" => with_channel(st, body, |ch| {
                let ml = positive(body, "ml")?;
                ch["fR"] = json!(ml / TEST_RUN_SECS);
                Ok(())
            }),
            "/api/stock/reset" => with_channel(st, body, |ch| {
                ch["stock"] = json!(positive(body, "ml")?);
                Ok(())
            }),
            "/api/fert/schedule" => with_channel(st, body, |ch| {
                let doses = body["doses"].as_array().ok_or("missing doses")?;
                if doses.len() != 7 {
                    return Err("doses must have 7 entries");
                }
                ch["doses"] = Value::Array(doses.clone());
                ch["sH"] = json!(num(body, "hour").unwrap_or(0.0) as u8);
                ch["sM"] = json!(num(body, "minute").unwrap_or(0.0) as u8);
                Ok(())
            }),
            "/api/config" => {
                // Geometry is stored in whole centimetres, like the firmware's ints.
                for key in ["aqHeight", "aqLength", "aqWidth", "aqMarginCm"] {
                    if let Some(v) = num(body, key) {
                        st[key] = json!(v.max(0.0).round() as u32);
                    }
                }
                for key in ["primeRatio", "reservoirVolume"] {
                    if let Some(v) = num(body, key) {
                        st[key] = json!(v);
                    }
                }
                Ok(())
            }
            "/api/tpa/config" => {
                st["reservoirSafetyML"] = json!(num(body, "reservoirSafetyML").unwrap_or(0.0));
                Ok(())
            }
            "/api/tpa/pump" | "/api/tpa/run3s" => tpa_pump(body).map(|_| ()),
            "/api/tpa/calibrate" => tpa_pump(body).and_then(|pump| {
                let ml = positive(body, "ml")?;
                st[format!("{pump}FlowRate").as_str()] = json!(ml / TEST_RUN_SECS);
                Ok(())
            }),
            "/api/maintenance" => {
                let on = st["maintenance"].as_bool().unwrap_or(false);
                st["maintenance"] = json!(!on);
                Ok(())
            }
            "/api/tpa/start" => {
                if st["tpaConfigReady"].as_bool().unwrap_or(false) {
                    st["tpaState"] = json!("CANISTER_OFF");
                    Ok(())
                } else {
                    Err("TPA config incomplete")
                }
            }
            "/api/tpa/abort" => {
                st["tpaState"] = json!("IDLE");
                Ok(())
            }
            "/api/emergency/stop" => {
                st["emergency"] = json!(true);
                st["canister"] = json!(false);
                Ok(())
            }
            _ => return Response::new(404, json!({ "error": "not found" }).to_string()),
        };
        recompute(st);
        match outcome {
            Ok(()) => Response::new(200, json!({ "ok": true }).to_string()),
            Err(msg) => Response::new(200, json!({ "error": msg }).to_string()),
        }
    }
}

fn num(body: &Value, key: &str) -> Option<f64> {
    body.get(key).and_then(Value::as_f64)
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn positive(body: &Value, key: &str) -> Result<f64, &'static str> {
    match num(body, key) {
        Some(v) if v > 0.0 => Ok(v),
        _ => Err("volume must be > 0"),
    }
}

fn tpa_pump(body: &Value) -> Result<&'static str, &'static str> {
    match body.get("pump").and_then(Value::as_str) {
        Some("drain") => Ok("drain"),
        Some("refill") => Ok("refill"),
        _ => Err("invalid pump"),
    }
}

fn with_channel(
    st: &mut Value,
    body: &Value,
    f: impl FnOnce(&mut Value) -> Result<(), &'static str>,
) -> Result<(), &'static str> {
    let idx = num(body, "channel").ok_or("missing channel")?;
    let stocks = st["stocks"].as_array_mut().ok_or("no channels")?;
    if idx < 0.0 || idx as usize >= stocks.len() {
        return Err("invalid channel");
    }
    f(&mut stocks[idx as usize])
}

fn apply_schedule(st: &mut Value, body: &Value) -> Result<(), &'static str> {
    let ranges: [(&str, f64); 5] = [
        ("tpaInterval", 90.0),
        ("tpaDay", 6.0),
        ("tpaHour", 23.0),
        ("tpaMinute", 59.0),
        ("tpaPercent", 100.0),
    ];
    for (key, max) in ranges {
        if let Some(v) = num(body, key) {
            if !(0.0..=max).contains(&v) {
                return Err("schedule value out of range");
            }
            st[key] = json!(v as u32);
        }
    }
    Ok(())
}

/// Device-side derived fields.
fn recompute(st: &mut Value) {
    let f = |k: &str| st[k].as_f64().unwrap_or(0.0);
    let (h, l, w, margin) = (f("aqHeight"), f("aqLength"), f("aqWidth"), f("aqMarginCm"));
    let volume = ((h - margin) * l * w / 1000.0).max(0.0);
    let per_cm = l * w / 1000.0;
    let prime = f("reservoirVolume") * f("primeRatio");
    let ready = h > 0.0 && l > 0.0 && w > 0.0 && f("reservoirVolume") > 0.0 && f("tpaPercent") > 0.0;
    st["aquariumVolume"] = json!(volume);
    st["litersPerCm"] = json!(per_cm);
    st["primeMl"] = json!(prime);
    st["tpaConfigReady"] = json!(ready);
}

impl Transport for SimulatedDevice {
    fn get(&self, path: &str) -> Result<Response, BoxError> {
        match path {
            "/api/status" => Ok(Response::new(200, self.lock().to_string())),
            "/api/wifi/scan" => {
                let pending = self.shared.scans_pending.load(Ordering::Relaxed);
                if pending > 0 {
                    self.shared.scans_pending.store(pending - 1, Ordering::Relaxed);
                    return Ok(Response::new(202, ""));
                }
                let body = json!({ "networks": [
                    { "ssid": "Reef", "rssi": -48 },
                    { "ssid": "Garage", "rssi": -81 },
                    { "ssid": "Kitchen", "rssi": -63 },
                ]});
                Ok(Response::new(200, body.to_string()))
            }
            _ => Ok(Response::new(404, json!({ "error": "not found" }).to_string())),
        }
    }

    fn post_json(&self, path: &str, body: Option<&str>) -> Result<Response, BoxError> {
        let parsed = match body {
            Some(b) => match serde_json::from_str::<Value>(b) {
                Ok(v) => v,
                Err(_) => return Ok(Response::new(400, json!({ "error": "invalid json" }).to_string())),
            },
            None => json!({}),
        };
        tracing::debug!(path, "simulated command");
        Ok(self.handle_post(path, &parsed))
    }

    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response, BoxError> {
        if path != "/api/wifi" {
            return Ok(Response::new(404, ""));
        }
        let get = |k: &str| fields.iter().find(|(f, _)| *f == k).map(|(_, v)| v.to_string());
        match (get("ssid"), get("pass")) {
            (Some(ssid), pass) if !ssid.is_empty() => {
                if let Ok(mut g) = self.shared.credentials.lock() {
                    *g = Some((ssid, pass.unwrap_or_default()));
                }
                Ok(Response::new(200, "OK"))
            }
            _ => Ok(Response::new(400, "missing ssid")),
        }
    }

    fn subscribe(&self, path: &str) -> Result<Box<dyn EventStream + Send>, BoxError> {
        if path != "/events" {
            return Err(Box::new(crate::HttpError::Transport(format!(
                "no event source at {path}"
            ))));
        }
        Ok(Box::new(SimStream {
            device: self.clone(),
            sent: 0,
        }))
    }
}

struct SimStream {
    device: SimulatedDevice,
    sent: usize,
}

impl EventStream for SimStream {
    fn next_event(&mut self) -> Result<Option<ServerEvent>, BoxError> {
        if self.device.push_limit.is_some_and(|n| self.sent >= n) {
            return Ok(None);
        }
        // The first push goes out immediately on connect, like the firmware's onConnect.
        if self.sent > 0 && !self.device.push_interval.is_zero() {
            std::thread::sleep(self.device.push_interval);
        }
        self.sent += 1;
        self.device.shared.pushes.fetch_add(1, Ordering::Relaxed);
        Ok(Some(ServerEvent {
            event: "status".to_string(),
            data: self.device.lock().to_string(),
            id: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_sets_flow_rate_from_three_second_run() {
        let dev = SimulatedDevice::new();
        let resp = dev
            .post_json("/api/fert/calibrate", Some(r#"{"channel":1,"ml":4.5}"#))
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("ok"));
        assert_eq!(dev.status()["stocks"][1]["fR"], json!(1.5));
    }

    #[test]
    fn bad_channel_is_an_application_error() {
        let dev = SimulatedDevice::new();
        let resp = dev
            .post_json("/api/stock/reset", Some(r#"{"channel":9,"ml":100}"#))
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("invalid channel"));
    }

    #[test]
    fn config_recomputes_device_fields() {
        let dev = SimulatedDevice::new();
        dev.post_json(
            "/api/config",
            Some(r#"{"aqHeight":50,"aqLength":60,"aqWidth":30,"aqMarginCm":5,"primeRatio":0.05,"reservoirVolume":20}"#),
        )
        .unwrap();
        let st = dev.status();
        assert_eq!(st["aquariumVolume"], json!(81.0));
        assert!((st["primeMl"].as_f64().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(st["tpaConfigReady"], json!(true));
    }

    #[test]
    fn scan_reports_progress_then_networks() {
        let dev = SimulatedDevice::new().with_pending_scans(1);
        assert_eq!(dev.get("/api/wifi/scan").unwrap().status, 202);
        let done = dev.get("/api/wifi/scan").unwrap();
        assert_eq!(done.status, 200);
        assert!(done.body.contains("Reef"));
    }

    #[test]
    fn push_stream_honours_limit() {
        let dev = SimulatedDevice::new()
            .with_push_interval(Duration::ZERO)
            .with_push_limit(2);
        let mut s = dev.subscribe("/events").unwrap();
        assert!(s.next_event().unwrap().is_some());
        assert!(s.next_event().unwrap().is_some());
        assert!(s.next_event().unwrap().is_none());
        assert_eq!(dev.pushes_sent(), 2);
    }
}
