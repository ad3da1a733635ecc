//! End-to-end test: campaign output on disk

#![cfg(feature = "storage_csv")]

mod common;

use chrono::Local;
use common::{accuracy_settings, bind, simulator, AXIS};
use rust_motion_test::campaign::{
    run_bidirectional_accuracy_test, run_unidirectional_accuracy_test, CampaignControl,
};
use rust_motion_test::instrument::{MeasurementDevices, SimulatedGauge, MEASUREMENT_FAILED};
use rust_motion_test::storage::CsvResultSink;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_bidirectional_campaign_writes_settings_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;
    let devices = MeasurementDevices::new()
        .with_source(Arc::new(SimulatedGauge::new("Dial", sim.clone(), AXIS).with_offset(1.0)));
    let settings = accuracy_settings(2, 1);
    let mut sink = CsvResultSink::create(dir.path(), AXIS, &settings.title, Local::now()).unwrap();

    run_bidirectional_accuracy_test(&axis, &settings, &devices, &mut sink, &CampaignControl::new())
        .await
        .unwrap();

    let stem = sink.results_path().file_stem().unwrap().to_string_lossy().to_string();
    assert!(stem.ends_with(" Axis 1~ Accuracy"), "unexpected stem {stem}");
    assert_eq!(
        sink.settings_path().extension().and_then(|e| e.to_str()),
        Some("settingsfile")
    );

    let settings_text = std::fs::read_to_string(sink.settings_path()).unwrap();
    assert!(settings_text.starts_with("Test Type: Bidirectional Accuracy Test\n"));
    assert_eq!(settings_text.lines().count(), 15);

    let mut reader = csv::Reader::from_path(sink.results_path()).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        header,
        vec!["Cycle", "Step", "Status", "Target Position", "Axis Position", "Dial"]
    );
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 2 * 2 * 2);
    assert_eq!(&records[2][2], "Negative approach");
    assert_eq!(&records[7][0], "2");
}

#[tokio::test]
async fn test_unplugged_gauge_does_not_abort_csv_campaign() {
    let dir = tempfile::tempdir().unwrap();
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;
    let gauge = Arc::new(SimulatedGauge::new("Dial", sim.clone(), AXIS));
    let devices = MeasurementDevices::new().with_source(gauge.clone());
    let settings = accuracy_settings(3, 2);
    let mut sink = CsvResultSink::create(dir.path(), AXIS, &settings.title, Local::now()).unwrap();

    let unplug = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        gauge.set_connected(false);
    });
    let report = run_unidirectional_accuracy_test(&axis, &settings, &devices, &mut sink, &CampaignControl::new())
        .await
        .unwrap();
    unplug.await.unwrap();
    assert_eq!(report.records_written, 3 * 3);

    let mut reader = csv::Reader::from_path(sink.results_path()).unwrap();
    let width = reader.headers().unwrap().len();
    assert_eq!(width, 6);
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 9);
    assert!(records.iter().all(|r| r.len() == width));
    assert_eq!(&records[8][5], MEASUREMENT_FAILED);
}
