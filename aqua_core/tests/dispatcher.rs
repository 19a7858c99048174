use std::sync::Arc;
use std::time::Duration;

use aqua_core::mocks::ScriptedTransport;
use aqua_core::{AquaError, Command, CommandDispatcher, ErrorBus, Outcome, ValidationError};
use rstest::rstest;

fn dispatcher(t: ScriptedTransport) -> (Arc<ScriptedTransport>, CommandDispatcher<ScriptedTransport>, ErrorBus) {
    let t = Arc::new(t);
    let bus = ErrorBus::new();
    (Arc::clone(&t), CommandDispatcher::new(t, bus.clone()), bus)
}

#[test]
fn device_error_reaches_operator() {
    let (_, d, bus) = dispatcher(ScriptedTransport::new().on_post(200, r#"{"error":"invalid channel"}"#));
    let errors = bus.subscribe();
    let out = d
        .send(&Command::CalibrateChannel { channel: 9, ml: 4.5 })
        .unwrap();
    assert_eq!(out, Outcome::Rejected("invalid channel".into()));
    let ev = errors.try_recv().unwrap();
    assert_eq!(ev.message, "invalid channel");
    assert_eq!(ev.context, "fert/calibrate");
}

#[test]
fn network_failure_is_only_logged() {
    let (_, d, bus) = dispatcher(ScriptedTransport::new().on_post_error("connection refused"));
    let errors = bus.subscribe();
    let out = d.send(&Command::EmergencyStop).unwrap();
    assert!(matches!(out, Outcome::Failed(_)));
    assert!(errors.try_recv().is_err());
}

#[test]
fn invalid_input_is_never_sent() {
    let (t, d, _) = dispatcher(ScriptedTransport::new());
    let err = d
        .send(&Command::ResetStock { channel: 0, ml: 0.0 })
        .unwrap_err();
    assert!(matches!(err, ValidationError::NotPositive { field: "ml", .. }));
    assert!(d
        .dispatch(Command::RenameChannel {
            channel: 1,
            name: "  ".into()
        })
        .is_err());
    assert!(t.sent().is_empty());
}

#[rstest]
#[case(Command::StartTpa, "/api/tpa/start", None)]
#[case(Command::ToggleMaintenance, "/api/maintenance", None)]
#[case(Command::ChannelTestRun { channel: 2 }, "/api/fert/run3s", Some(r#"{"channel":2}"#))]
#[case(Command::TpaWeekday { day: 3, hour: 9, minute: 15 }, "/api/schedule", Some(r#"{"tpaDay":3,"tpaHour":9,"tpaMinute":15}"#))]
fn commands_post_to_their_paths(
    #[case] cmd: Command,
    #[case] path: &str,
    #[case] body: Option<&str>,
) {
    let (t, d, _) = dispatcher(ScriptedTransport::new());
    assert_eq!(d.send(&cmd).unwrap(), Outcome::Accepted);
    let sent = t.sent();
    assert_eq!(sent[0].0, path);
    let got: Option<serde_json::Value> = sent[0].1.as_deref().map(|b| serde_json::from_str(b).unwrap());
    let want: Option<serde_json::Value> = body.map(|b| serde_json::from_str(b).unwrap());
    assert_eq!(got, want);
}

#[test]
fn background_dispatch_reports_outcome() {
    let (_, d, _) = dispatcher(ScriptedTransport::new());
    let pending = d.dispatch(Command::AbortTpa).unwrap();
    assert_eq!(pending.wait(Duration::from_secs(2)), Some(Outcome::Accepted));
}

#[test]
fn wifi_credentials_go_as_form() {
    let (t, d, _) = dispatcher(ScriptedTransport::new());
    d.provision_wifi("Reef", "s3cret").unwrap();
    let forms = t.forms();
    assert_eq!(forms[0].0, "/api/wifi");
    assert_eq!(
        forms[0].1,
        vec![("ssid".to_string(), "Reef".to_string()), ("pass".to_string(), "s3cret".to_string())]
    );
}

#[test]
fn refused_wifi_credentials_surface() {
    let (_, d, bus) = dispatcher(ScriptedTransport::new().on_post(500, ""));
    let errors = bus.subscribe();
    let err = d.provision_wifi("Reef", "x").unwrap_err();
    assert!(matches!(err, AquaError::Device(_)));
    assert_eq!(errors.try_recv().unwrap().context, "wifi");
    assert!(matches!(
        d.provision_wifi("", "x"),
        Err(AquaError::Validation(ValidationError::Empty { field: "ssid" }))
    ));
}
