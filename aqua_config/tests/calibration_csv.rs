use std::fs::File;
use std::io::Write;

use aqua_config::{SheetTarget, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(dir: &tempfile::TempDir, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("calib.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    path
}

#[rstest]
fn loads_channels_and_tpa_pumps() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        &dir,
        &["target,measured_ml", "1,4.5", "5, 3.0", "drain,120", "Refill,95.5"],
    );
    let rows = load_calibration_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            (SheetTarget::Channel(0), 4.5),
            (SheetTarget::Channel(4), 3.0),
            (SheetTarget::Drain, 120.0),
            (SheetTarget::Refill, 95.5),
        ]
    );
}

#[rstest]
fn rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, &["channel,ml", "1,4.5"]);
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("must have headers 'target,measured_ml'"));
}

#[rstest]
#[case("1,0")]
#[case("2,-3.5")]
fn rejects_non_positive_volume(#[case] row: &str) {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, &["target,measured_ml", row]);
    let err = load_calibration_csv(&path).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("row 2"), "{msg}");
    assert!(msg.contains("measured_ml must be > 0"), "{msg}");
}

#[rstest]
fn rejects_unknown_target_with_line_number() {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, &["target,measured_ml", "1,2.0", "skimmer,3.0"]);
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("row 3"));
}

#[rstest]
fn rejects_empty_sheet() {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, &["target,measured_ml"]);
    assert!(load_calibration_csv(&path).is_err());
}
