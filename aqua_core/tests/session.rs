use std::sync::Arc;
use std::time::Duration;

use aqua_core::mocks::{ScriptedTransport, StreamStep};
use aqua_core::{BuildError, Command, Health, Outcome, ScanState, SessionBuilder, SyncCfg, SyncUpdate};
use aqua_http::SimulatedDevice;
use aqua_traits::clock::test_clock::TestClock;

#[test]
fn builder_requires_transport() {
    let err = SessionBuilder::<ScriptedTransport>::new().build().err().unwrap();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingTransport)
    ));
}

#[test]
fn builder_rejects_zero_queue() {
    let err = SessionBuilder::new()
        .transport(Arc::new(ScriptedTransport::new()))
        .sync(SyncCfg {
            queue_depth: 0,
            ..SyncCfg::default()
        })
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn closed_session_discards_results() {
    let t = ScriptedTransport::new()
        .on_get("/api/status", 200, "{}")
        .on_post(200, r#"{"error":"late"}"#)
        .with_stream(vec![StreamStep::status("{}")]);
    let mut session = SessionBuilder::new()
        .transport(Arc::new(t))
        .clock(TestClock::new())
        .build()
        .unwrap();
    let errors = session.errors();
    session.start();
    session.close();
    let out = session.dispatcher().send(&Command::AbortTpa).unwrap();
    assert_eq!(out, Outcome::Rejected("late".into()));
    assert!(errors.try_recv().is_err());
}

#[test]
fn simulated_device_round_trip() {
    let device = SimulatedDevice::new().with_push_interval(Duration::from_millis(20));
    let mut session = SessionBuilder::new()
        .transport(Arc::new(device.clone()))
        .build()
        .unwrap();
    assert!(matches!(session.start(), SyncUpdate::Applied { .. }));
    assert_eq!(session.health(), Health::Healthy);

    let cmd = Command::CalibrateChannel { channel: 0, ml: 4.5 };
    assert_eq!(session.dispatcher().send(&cmd).unwrap(), Outcome::Accepted);

    // The effect arrives with a later push, never applied locally.
    let mut calibrated = false;
    for _ in 0..50 {
        if let Some(SyncUpdate::Applied { snapshot, .. }) =
            session.sync_mut().next_update(Duration::from_millis(200))
            && (snapshot.stocks[0].flow_rate - 1.5).abs() < 1e-9
        {
            calibrated = true;
            break;
        }
    }
    assert!(calibrated);
    assert!(session.metrics().is_some());

    let mut scanner = session.scanner();
    match scanner.run(session.transport().as_ref(), &TestClock::new()) {
        ScanState::Ready(nets) => assert_eq!(nets[0].ssid, "Reef"),
        other => panic!("unexpected scan state {other:?}"),
    }
    session.close();
}
