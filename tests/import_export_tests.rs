use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use weightrs::export::{export_to_path, ExportFormat};
use weightrs::import::{ImportManager, ImportMode};
use weightrs::{FixedClock, Settings, Tracker, WeightRecord};

fn create_test_records() -> Vec<WeightRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    [
        (dec!(84.2), Some(dec!(28.4))),
        (dec!(83.9), None),
        (dec!(83.7), Some(dec!(28.0))),
        (dec!(84.0), None),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (weight, fat))| {
        WeightRecord::new(start + chrono::Duration::days(i as i64), weight, fat).unwrap()
    })
    .collect()
}

fn create_test_tracker() -> Tracker {
    Tracker::new(
        Vec::new(),
        Settings::default(),
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())),
    )
}

#[test]
fn test_json_round_trip_restores_records_and_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("backup.json");
    let records = create_test_records();
    let settings = Settings {
        height_cm: dec!(168),
        start_weight: dec!(86),
        goal_weight: dec!(74.5),
        daily_intake_kcal: dec!(1700),
    };

    export_to_path(ExportFormat::Json, &records, &settings, Utc::now(), &path).unwrap();

    let tracker = create_test_tracker();
    tracker.add_record(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), dec!(90), None, false).unwrap();
    let report = tracker.import_file(&path).unwrap();

    assert_eq!(report.mode, ImportMode::Replace);
    assert_eq!(report.summary.accepted, records.len());
    assert!(report.settings_restored);
    assert_eq!(tracker.records(), records);
    assert_eq!(tracker.settings(), settings);
}

#[test]
fn test_csv_round_trip_restores_records() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("backup.csv");
    let records = create_test_records();

    export_to_path(ExportFormat::Csv, &records, &Settings::default(), Utc::now(), &path).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("\u{feff}Date,Weight,BodyFat\n"));

    let tracker = create_test_tracker();
    let report = tracker.import_file(&path).unwrap();

    assert_eq!(report.mode, ImportMode::Merge);
    assert_eq!(report.failed(), 0);
    assert_eq!(tracker.records(), records);
}

#[test]
fn test_csv_with_invalid_calendar_date() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("weights.csv");
    fs::write(
        &path,
        "date,weight,fat\r\n2024-02-27,80.1,\r\n\"2024-02-30\",oops\r\n2024-02-28,79.9,22.5\r\n2024-02-29,79.7,\r\n",
    )
    .unwrap();

    let tracker = create_test_tracker();
    let report = tracker.import_file(&path).unwrap();

    assert_eq!(report.summary.accepted, 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(tracker.record_count(), 3);
    assert_eq!(tracker.records()[1].fat, Some(dec!(22.5)));
}

#[test]
fn test_csv_merge_overwrites_matching_dates() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("update.csv");
    fs::write(&path, "2024-05-02,83.0\n2024-05-10,82.5\n").unwrap();

    let tracker = create_test_tracker();
    for record in create_test_records() {
        tracker.add_record(record.date, record.weight, record.fat, false).unwrap();
    }
    tracker.import_file(&path).unwrap();

    let records = tracker.records();
    assert_eq!(records.len(), 5);
    assert_eq!(records[1].weight, dec!(83.0));
    assert_eq!(records[4].date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
}

#[test]
fn test_out_of_range_rows_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("legacy.json");
    fs::write(
        &path,
        r#"{"records": [
            {"date": "2024-01-01", "weight": 80},
            {"date": "2024-01-02", "weight": 500},
            {"weight": 79.5},
            {"date": "2024-01-03", "weight": 79.4, "fat": 0}
        ]}"#,
    )
    .unwrap();

    let tracker = create_test_tracker();
    let report = tracker.import_file(&path).unwrap();

    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejected, 2);
    assert!(!report.settings_restored);
    assert_eq!(tracker.settings(), Settings::default());
    assert_eq!(tracker.records()[1].fat, None);
}

#[test]
fn test_unsupported_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("weights.xlsx");
    fs::write(&path, "irrelevant").unwrap();

    assert!(ImportManager::new().import_file(&path).is_err());
    assert!(create_test_tracker().import_file(&path).is_err());
}
