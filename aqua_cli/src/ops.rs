//! Command execution: build a session, run one operator action, report.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aqua_core::calibration::{CalibrationSource, CsvCalibrationSource, flow_rate};
use aqua_core::model::DAYS_PER_WEEK;
use aqua_core::{
    AquaError, AquariumConfig, Command, DisplayCfg, Outcome, ScanCfg, ScanState, Session,
    SessionBuilder, SyncCfg, SyncUpdate, TpaPump, ValidationError,
};
use aqua_http::SimulatedDevice;
use aqua_traits::{Clock, Transport};
use eyre::WrapErr;

use crate::cli::{Commands, FertCmd, Pump, TpaCmd};
use crate::render;

const WATCH_POLL: Duration = Duration::from_millis(200);

/// Simulated controller, tuned by `AQUA_SIM_*` environment variables.
pub fn sim_device() -> SimulatedDevice {
    let env_u64 = |k: &str| std::env::var(k).ok().and_then(|v| v.parse::<u64>().ok());
    let mut dev = SimulatedDevice::new();
    if let Some(ms) = env_u64("AQUA_SIM_PUSH_MS") {
        dev = dev.with_push_interval(Duration::from_millis(ms));
    }
    if let Some(n) = env_u64("AQUA_SIM_SCANS") {
        dev = dev.with_pending_scans(u32::try_from(n).unwrap_or(u32::MAX));
    }
    if std::env::var("AQUA_SIM_WIFI").is_ok_and(|v| v == "0") {
        dev.set_field("wifiConnected", serde_json::json!(false));
    }
    dev
}

pub fn execute<T>(cmd: &Commands, transport: Arc<T>, cfg: &aqua_config::Config, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
{
    let mut session = SessionBuilder::new()
        .transport(transport)
        .sync(SyncCfg::from(cfg))
        .scan(ScanCfg::from(&cfg.scan))
        .display(DisplayCfg::from(&cfg.display))
        .build()?;
    let result = match cmd {
        Commands::Status => status(&mut session, json),
        Commands::Watch { count } => watch(&mut session, *count, json),
        Commands::Health => health(&mut session, json),
        Commands::Tpa(t) => submit(&session, tpa_command(t), json),
        Commands::Fert(f) => match fert_command(f)? {
            Some(c) => submit(&session, c, json),
            None => agenda(&mut session, json),
        },
        Commands::Aquarium {
            height,
            length,
            width,
            margin,
            prime_ratio,
            reservoir,
        } => submit(
            &session,
            Command::Aquarium(AquariumConfig {
                aq_height: *height,
                aq_length: *length,
                aq_width: *width,
                aq_margin_cm: *margin,
                prime_ratio: *prime_ratio,
                reservoir_volume: *reservoir,
            }),
            json,
        ),
        Commands::Maintenance => submit(&session, Command::ToggleMaintenance, json),
        Commands::EmergencyStop => submit(&session, Command::EmergencyStop, json),
        Commands::CalibrateSheet { file } => calibrate_sheet(&mut session, file, json),
        Commands::Scan => scan(&session, json),
        Commands::Wifi { ssid, pass } => wifi(&session, ssid, pass, json),
    };
    session.close();
    result
}

const fn pump(p: Pump) -> TpaPump {
    match p {
        Pump::Drain => TpaPump::Drain,
        Pump::Refill => TpaPump::Refill,
    }
}

/// CLI channel numbers are 1-based; clap rejects 0.
fn index(channel: u16) -> usize {
    usize::from(channel).saturating_sub(1)
}

fn tpa_command(t: &TpaCmd) -> Command {
    match t {
        TpaCmd::Schedule {
            interval,
            at,
            percent,
        } => Command::TpaSchedule {
            interval_days: *interval,
            hour: at.hour,
            minute: at.minute,
            percent: *percent,
        },
        TpaCmd::Weekday { day, at } => Command::TpaWeekday {
            day: *day,
            hour: at.hour,
            minute: at.minute,
        },
        TpaCmd::Safety { ml } => Command::TpaSafety {
            reservoir_safety_ml: *ml,
        },
        TpaCmd::Pump { pump: p, state } => Command::TpaPumpSwitch {
            pump: pump(*p),
            on: state.is_on(),
        },
        TpaCmd::TestRun { pump: p } => Command::TpaTestRun { pump: pump(*p) },
        TpaCmd::Calibrate { pump: p, ml } => Command::CalibrateTpaPump {
            pump: pump(*p),
            ml: *ml,
        },
        TpaCmd::Start => Command::StartTpa,
        TpaCmd::Abort => Command::AbortTpa,
    }
}

/// `None` for views that read the snapshot instead of sending anything.
fn fert_command(f: &FertCmd) -> Result<Option<Command>, ValidationError> {
    Ok(Some(match f {
        FertCmd::Name { channel, name } => Command::RenameChannel {
            channel: index(*channel),
            name: name.clone(),
        },
        FertCmd::Pwm { channel, pwm } => Command::SetPwm {
            channel: index(*channel),
            pwm: *pwm,
        },
        FertCmd::Pump { channel, state } => Command::ChannelPump {
            channel: index(*channel),
            on: state.is_on(),
        },
        FertCmd::TestRun { channel } => Command::ChannelTestRun {
            channel: index(*channel),
        },
        FertCmd::Calibrate { channel, ml } => Command::CalibrateChannel {
            channel: index(*channel),
            ml: *ml,
        },
        FertCmd::ResetStock { channel, ml } => Command::ResetStock {
            channel: index(*channel),
            ml: *ml,
        },
        FertCmd::Schedule { channel, doses, at } => {
            let week: [f64; DAYS_PER_WEEK] =
                doses
                    .as_slice()
                    .try_into()
                    .map_err(|_| ValidationError::OutOfRange {
                        field: "doses",
                        value: i64::try_from(doses.len()).unwrap_or(i64::MAX),
                        min: 7,
                        max: 7,
                    })?;
            Command::ChannelSchedule {
                channel: index(*channel),
                doses: week,
                hour: at.hour,
                minute: at.minute,
            }
        }
        FertCmd::Agenda => return Ok(None),
    }))
}

fn report(json: bool, cmd: &Command) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "command": cmd.label(), "outcome": "accepted" })
        );
    } else {
        println!("{}: accepted", cmd.label());
    }
}

fn submit<T, C>(session: &Session<T, C>, cmd: Command, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    match session.dispatcher().send(&cmd)? {
        Outcome::Accepted => {
            report(json, &cmd);
            Ok(())
        }
        Outcome::Rejected(msg) => Err(AquaError::Device(msg).into()),
        Outcome::Failed(reason) => Err(AquaError::Transport(reason).into()),
    }
}

/// Pull once; an unreachable or unreadable controller is an error.
fn pull<T, C>(session: &mut Session<T, C>) -> eyre::Result<aqua_core::Snapshot>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    match session.sync_mut().pull() {
        SyncUpdate::Applied { snapshot, .. } => Ok(snapshot),
        SyncUpdate::Lost { reason } | SyncUpdate::Dropped { reason, .. } => {
            Err(AquaError::Transport(reason).into())
        }
    }
}

fn metrics_now<T, C>(session: &Session<T, C>) -> eyre::Result<aqua_core::DerivedMetrics>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    session
        .metrics()
        .ok_or_else(|| eyre::Report::new(AquaError::Closed))
}

fn status<T, C>(session: &mut Session<T, C>, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    let snap = pull(session)?;
    let m = metrics_now(session)?;
    if json {
        println!(
            "{}",
            render::status_json(&snap, &m, session.health(), session.ui_mode())
        );
    } else {
        print!(
            "{}",
            render::status_text(&snap, &m, session.health(), session.ui_mode())
        );
    }
    Ok(())
}

fn health<T, C>(session: &mut Session<T, C>, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    let snap = pull(session)?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "health": session.health(),
                "mode": session.ui_mode(),
                "emergency": snap.emergency,
            })
        );
    } else {
        println!(
            "{}",
            render::health_line(session.health(), session.ui_mode(), snap.emergency)
        );
    }
    Ok(())
}

fn agenda<T, C>(session: &mut Session<T, C>, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    pull(session)?;
    let m = metrics_now(session)?;
    if json {
        println!("{}", serde_json::json!({ "agenda": m.agenda }));
    } else {
        print!("{}", render::agenda_text(&m));
    }
    Ok(())
}

fn watch<T, C>(session: &mut Session<T, C>, count: Option<usize>, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }
    let errors = session.errors();
    let mut applied = 0usize;
    let mut last_health = session.health();
    let mut update = Some(session.start());

    while !stop.load(Ordering::Relaxed) {
        if let Some(u) = update.take() {
            if let SyncUpdate::Applied { snapshot, .. } = u {
                applied += 1;
                let m = aqua_core::DerivedMetrics::from_snapshot(
                    &snapshot,
                    session.clock().unix_secs(),
                    session.display(),
                );
                if json {
                    println!(
                        "{}",
                        render::status_json(&snapshot, &m, session.health(), session.ui_mode())
                    );
                } else {
                    println!("{}", render::snapshot_line(&snapshot, &m));
                }
            }
            if session.health() != last_health {
                last_health = session.health();
                if !json {
                    println!("health: {last_health:?}");
                }
            }
            if count.is_some_and(|n| applied >= n) {
                break;
            }
        }
        for ev in errors.try_iter() {
            eprintln!("{ev}");
        }
        update = session.sync_mut().next_update(WATCH_POLL);
    }
    tracing::info!(applied, "watch finished");
    Ok(())
}

fn calibrate_sheet<T, C>(session: &mut Session<T, C>, file: &Path, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    let source = CsvCalibrationSource::from_path(file)?;
    let before = match session.sync_mut().pull() {
        SyncUpdate::Applied { snapshot, .. } => Some(snapshot),
        _ => None,
    };
    let rows = source.measurements();
    let mut refused = 0usize;
    for (target, ml) in &rows {
        let cmd = target.command(*ml)?;
        let rate = flow_rate(*ml)?;
        let prev = before
            .as_deref()
            .and_then(|s| target.current_flow_rate(s));
        let outcome = session.dispatcher().send(&cmd)?;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "target": target.to_string(),
                    "measured_ml": ml,
                    "flow_rate": rate,
                    "previous_flow_rate": prev,
                    "outcome": format!("{outcome:?}"),
                })
            );
        } else {
            let prev = prev.map_or_else(|| "--".to_string(), |p| format!("{p:.2}"));
            println!("{target}: {prev} -> {rate:.2} mL/s  {outcome:?}");
        }
        match outcome {
            Outcome::Accepted => {}
            Outcome::Rejected(_) => refused += 1,
            Outcome::Failed(reason) => return Err(AquaError::Transport(reason).into()),
        }
    }
    if refused > 0 {
        return Err(AquaError::Device(format!(
            "{refused} of {} calibrations refused",
            rows.len()
        ))
        .into());
    }
    Ok(())
}

fn scan<T, C>(session: &Session<T, C>, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    let mut scanner = session.scanner();
    match scanner.run(session.transport().as_ref(), session.clock()) {
        ScanState::Ready(nets) => {
            if json {
                println!("{}", serde_json::json!({ "networks": nets }));
            } else {
                print!("{}", render::networks_text(nets));
            }
            Ok(())
        }
        ScanState::Failed(reason) => Err(AquaError::Transport(reason.clone()).into()),
        other => Err(eyre::eyre!("scan ended in unexpected state {other:?}")),
    }
}

fn wifi<T, C>(session: &Session<T, C>, ssid: &str, pass: &str, json: bool) -> eyre::Result<()>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    session.dispatcher().provision_wifi(ssid, pass)?;
    if json {
        println!("{}", serde_json::json!({ "ssid": ssid, "outcome": "accepted" }));
    } else {
        println!("credentials sent; controller restarting to join {ssid}");
    }
    Ok(())
}
