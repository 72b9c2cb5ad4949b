use rawnav_core::notice::{
    NOTICE_CODE_DUPLICATE_TRACE_INDEX, NOTICE_CODE_INSUFFICIENT_MATCHES,
    NOTICE_CODE_MATCH_TOO_FAR, NOTICE_CODE_MISSING_REFERENCE_GROUP,
    NOTICE_CODE_MISSING_ROUTE_ENDPOINT, NOTICE_CODE_SEGMENT_TOO_FAR,
    NOTICE_CODE_STOP_ORDER_VIOLATION,
};
use rawnav_core::{run_pipeline, InputError, MatchSettings, RawnavDataset};
use rawnav_model::{DayType, HourInterval, TripSpeed};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent() // crates/
        .unwrap()
        .parent() // root
        .unwrap()
        .to_path_buf()
}

fn route79_root() -> PathBuf {
    project_root().join("test-data").join("route79")
}

fn load_route79(with_segments: bool) -> RawnavDataset {
    let root = route79_root();
    let boundaries = root.join("segment_boundaries.csv");
    RawnavDataset::from_paths(
        &root.join("trace.csv"),
        &root.join("stops.csv"),
        with_segments.then_some(boundaries.as_path()),
    )
    .expect("load route 79 fixture")
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), nanos));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_route79_summaries() {
    let dataset = load_route79(false);
    let outcome = run_pipeline(&dataset, &MatchSettings::default(), None).expect("run");

    let counts = &outcome.stage_counts;
    assert_eq!(counts.trace_rows, 162);
    assert_eq!(counts.trace_rows_unique, 160);
    assert_eq!(counts.trips, 3);
    assert_eq!(counts.matches, 12);
    assert_eq!(counts.matches_within_distance, 9);
    assert_eq!(counts.matches_in_order, 9);
    assert_eq!(counts.summaries, 2);
    assert_eq!(counts.segment_points, 0);

    let full = &outcome.summaries[0];
    assert_eq!(full.index_trip_start_in_clean_data, 944);
    assert_eq!(full.index_loc_first_stop, 0);
    assert_eq!(full.index_loc_last_stop, 99);
    assert_eq!(full.trip_dist_mi, 0.68);
    assert_eq!(full.trip_dur_sec, 495.0);
    assert_eq!(full.trip_speed_mph, TripSpeed::Mph(4.96));
    assert_eq!(full.trip_length_mi_direct, Some(0.68));
    assert_eq!(full.route_text.as_deref(), Some("79_01"));
    assert!(full.covers_route_endpoints);
    assert!(full.dist_first_stop_ft > 10.0 && full.dist_first_stop_ft < 20.0);

    let partial = &outcome.summaries[1];
    assert_eq!(partial.index_trip_start_in_clean_data, 2101);
    assert_eq!(partial.last_stop_sort_order, 3);
    assert_eq!(partial.trip_dist_mi, 0.28);
    assert!(!partial.covers_route_endpoints);

    let notices = &outcome.notices;
    assert_eq!(notices.count_code(NOTICE_CODE_DUPLICATE_TRACE_INDEX), 1);
    assert_eq!(notices.count_code(NOTICE_CODE_MISSING_REFERENCE_GROUP), 1);
    assert_eq!(notices.count_code(NOTICE_CODE_MATCH_TOO_FAR), 3);
    assert_eq!(notices.count_code(NOTICE_CODE_STOP_ORDER_VIOLATION), 0);
    assert_eq!(notices.count_code(NOTICE_CODE_MISSING_ROUTE_ENDPOINT), 1);
    assert_eq!(notices.count_code(NOTICE_CODE_INSUFFICIENT_MATCHES), 0);
}

#[test]
fn test_route79_segment_trajectories() {
    let dataset = load_route79(true);
    assert_eq!(dataset.segments.len(), 1);
    let outcome = run_pipeline(&dataset, &MatchSettings::default(), None).expect("run");

    let points = &outcome.trajectories;
    assert_eq!(points.len(), 41);
    assert!(points
        .iter()
        .all(|point| point.index_trip_start_in_clean_data == 944));
    assert_eq!(points[0].index_loc, 30);
    assert_eq!(points[0].odom_adjusted_ft, 0.0);
    assert_eq!(points[40].odom_adjusted_ft, 1456.0);
    assert_eq!(points[40].time_adjusted_sec, 200.0);
    assert_eq!(points[0].hour_interval, Some(HourInterval::AmPeak));
    assert_eq!(points[0].day_type, Some(DayType::Weekday));
    assert_eq!(outcome.notices.count_code(NOTICE_CODE_SEGMENT_TOO_FAR), 2);
}

#[test]
fn test_tighter_threshold_drops_every_match() {
    let dataset = load_route79(false);
    let settings = MatchSettings {
        max_stop_distance_ft: 5.0,
        ..MatchSettings::default()
    };
    let outcome = run_pipeline(&dataset, &settings, None).expect("run");

    assert!(outcome.matches.is_empty());
    assert!(outcome.summaries.is_empty());
    // Both scheduled trips are left with nothing to summarize.
    assert_eq!(
        outcome.notices.count_code(NOTICE_CODE_INSUFFICIENT_MATCHES),
        2
    );
}

#[test]
fn test_missing_trace_column_is_reported() {
    let dir = temp_dir("rawnav_missing_column");
    let trace = dir.join("trace.csv");
    fs::write(
        &trace,
        "filename,IndexTripStartInCleanData,route,pattern,IndexLoc,Lat,Long,SecPastSt\n\
         rawnav001.txt,1,79,1,0,38.96,-77.02,0\n",
    )
    .unwrap();
    let stops = route79_root().join("stops.csv");

    let err = RawnavDataset::from_paths(&trace, &stops, None).unwrap_err();
    assert!(
        matches!(&err, InputError::MissingColumn { column, .. } if column == "odomt_ft"),
        "unexpected error: {}",
        err
    );
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_input_file() {
    let dir = temp_dir("rawnav_missing_file");
    let err = RawnavDataset::from_paths(
        &dir.join("trace.csv"),
        &route79_root().join("stops.csv"),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, InputError::MissingFile(_)));
    fs::remove_dir_all(&dir).ok();
}
