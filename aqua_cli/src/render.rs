//! Text and JSON output for status, snapshots and scan results.

use aqua_core::metrics::{DerivedMetrics, or_dash};
use aqua_core::model::{DeviceStatus, WEEKDAY_NAMES};
use aqua_core::{Health, Network, Snapshot, UiMode};
use serde_json::json;

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

fn mode_name(mode: UiMode) -> &'static str {
    match mode {
        UiMode::Dashboard => "dashboard",
        UiMode::NetworkSetup => "network-setup",
    }
}

fn health_name(h: Health) -> &'static str {
    match h {
        Health::Unknown => "unknown",
        Health::Healthy => "healthy",
        Health::Unhealthy => "unhealthy",
    }
}

pub fn health_line(health: Health, mode: UiMode, emergency: bool) -> String {
    format!(
        "health {}  mode {}{}",
        health_name(health),
        mode_name(mode),
        if emergency { "  EMERGENCY STOP" } else { "" }
    )
}

pub fn status_json(s: &DeviceStatus, m: &DerivedMetrics, health: Health, mode: UiMode) -> String {
    json!({
        "health": health,
        "mode": mode,
        "status": s,
        "metrics": m,
    })
    .to_string()
}

pub fn status_text(s: &DeviceStatus, m: &DerivedMetrics, health: Health, mode: UiMode) -> String {
    let mut out = String::new();
    let mut line = |k: &str, v: String| {
        out.push_str(&format!("{k:<10} {v}\n"));
    };
    line("mode", mode_name(mode).to_string());
    line("health", health_name(health).to_string());
    if let Some(t) = &s.time {
        line("time", t.clone());
    }
    let level = if m.fullness.sensor_override {
        format!("{}% (optical sensor full)", m.fullness.percent)
    } else {
        format!(
            "{}% ({:?})  distance {:.1} cm  headroom {:?}",
            m.fullness.percent, m.fullness.tier, s.water_level, m.headroom
        )
        .to_lowercase()
    };
    line("level", level);
    line(
        "volume",
        format!(
            "{} L  ({} L/cm)",
            or_dash(m.aquarium_volume_l, 1),
            or_dash(m.liters_per_cm, 2)
        ),
    );
    let next = m.next_tpa.map_or_else(
        || "never run".to_string(),
        |p| {
            if p.overdue {
                "overdue".to_string()
            } else if p.imminent {
                "due within a day".to_string()
            } else {
                format!("next in {} days", p.days_until)
            }
        },
    );
    line(
        "tpa",
        format!("{}  {}  {next}", s.tpa_state, m.schedule_summary),
    );
    line(
        "tpa size",
        format!(
            "{} L  prime {} mL",
            or_dash(m.tpa_volume_l, 1),
            or_dash(m.prime_dose_ml, 1)
        ),
    );
    if !m.tpa_missing.is_empty() {
        let missing: Vec<String> = m.tpa_missing.iter().map(ToString::to_string).collect();
        line("missing", missing.join(", "));
    }
    line(
        "flags",
        format!(
            "canister {}  maintenance {}  float {}{}",
            on_off(s.canister),
            on_off(s.maintenance),
            on_off(s.float_switch),
            if s.emergency { "  EMERGENCY STOP" } else { "" }
        ),
    );
    out.push_str("channels\n");
    for c in &m.channels {
        let fr = s.channel(c.channel).map_or(0.0, |ch| ch.flow_rate);
        let rate = if c.calibrated {
            format!("{fr:.2} mL/s")
        } else {
            "uncalibrated".to_string()
        };
        out.push_str(&format!(
            "  {:<3} {:<14} stock {:>6.1} mL ({:>3.0}%){}  {rate}  week {:.1} mL / {:.1} s\n",
            format!("{}", c.channel + 1),
            c.label,
            s.channel(c.channel).map_or(0.0, |ch| ch.stock),
            c.stock.percent,
            if c.stock.low { " LOW" } else { "" },
            c.weekly_ml,
            c.weekly_seconds,
        ));
    }
    if mode == UiMode::NetworkSetup {
        out.push_str("\nController has no network. Use `aqua scan` then `aqua wifi --ssid .. --pass ..`.\n");
    }
    out
}

pub fn snapshot_line(snap: &Snapshot, m: &DerivedMetrics) -> String {
    format!(
        "{} level {}% tpa {} stocks [{}]",
        snap.time.as_deref().unwrap_or("--:--:--"),
        m.fullness.percent,
        snap.tpa_state,
        snap.stocks
            .iter()
            .map(|c| format!("{:.0}", c.stock))
            .collect::<Vec<_>>()
            .join(" ")
    )
}

pub fn agenda_text(m: &DerivedMetrics) -> String {
    if m.agenda.is_empty() {
        return "no channel doses this week\n".to_string();
    }
    let mut out = format!("{:<16} {:<6}", "channel", "time");
    for d in WEEKDAY_NAMES {
        out.push_str(&format!(" {d:>5}"));
    }
    out.push('\n');
    for row in &m.agenda {
        out.push_str(&format!("{:<16} {:<6}", row.label, row.time));
        for d in row.doses {
            out.push_str(&format!(" {d:>5.1}"));
        }
        out.push('\n');
    }
    out
}

pub fn networks_text(nets: &[Network]) -> String {
    if nets.is_empty() {
        return "no networks found\n".to_string();
    }
    nets.iter()
        .map(|n| format!("{:>4} dBm  {}\n", n.signal_strength, n.ssid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_core::DisplayCfg;

    #[test]
    fn setup_mode_prints_hint() {
        let s = DeviceStatus::default();
        let m = DerivedMetrics::from_snapshot(&s, 0, &DisplayCfg::default());
        let text = status_text(&s, &m, Health::Healthy, UiMode::NetworkSetup);
        assert!(text.contains("network-setup"));
        assert!(text.contains("aqua scan"));
        assert!(text.contains("--"));
    }

    #[test]
    fn health_line_names_mode() {
        let line = health_line(Health::Healthy, UiMode::NetworkSetup, true);
        assert_eq!(line, "health healthy  mode network-setup  EMERGENCY STOP");
    }

    #[test]
    fn strongest_network_first_in_listing() {
        let nets = vec![
            Network { ssid: "Reef".into(), signal_strength: -48 },
            Network { ssid: "Garage".into(), signal_strength: -81 },
        ];
        let text = networks_text(&nets);
        assert!(text.find("Reef").unwrap() < text.find("Garage").unwrap());
    }
}
