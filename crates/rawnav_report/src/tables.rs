use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use rawnav_model::{SegmentTracePoint, StopMatch, TripSummary};

fn write_rows<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T], what: &str) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {} file {}", what, path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write {} row to {}", what, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

pub fn write_matches_csv<P: AsRef<Path>>(path: P, matches: &[StopMatch]) -> anyhow::Result<()> {
    write_rows(path, matches, "stop match")
}

pub fn write_summaries_csv<P: AsRef<Path>>(
    path: P,
    summaries: &[TripSummary],
) -> anyhow::Result<()> {
    write_rows(path, summaries, "trip summary")
}

pub fn write_trajectories_csv<P: AsRef<Path>>(
    path: P,
    points: &[SegmentTracePoint],
) -> anyhow::Result<()> {
    write_rows(path, points, "segment trajectory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawnav_model::TripSpeed;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir =
            std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn summary(speed: TripSpeed) -> TripSummary {
        TripSummary {
            filename: "rawnav06435191012.txt".into(),
            index_trip_start_in_clean_data: 944,
            route: "79".into(),
            pattern: 1,
            route_text: Some("79_01".to_string()),
            first_stop_sort_order: 1,
            last_stop_sort_order: 6,
            index_loc_first_stop: 0,
            index_loc_last_stop: 99,
            start_odom_ft: 0.0,
            end_odom_ft: 3603.6,
            trip_dist_mi: 0.68,
            start_sec: 0.0,
            end_sec: 495.0,
            trip_dur_sec: 495.0,
            start_lat: 38.972,
            end_lat: 38.9621,
            start_long: -77.0273,
            end_long: -77.0273,
            dist_first_stop_ft: 14.18,
            dist_last_stop_ft: 14.18,
            trip_length_mi_direct: None,
            trip_speed_mph: speed,
            covers_route_endpoints: true,
        }
    }

    #[test]
    fn writes_undefined_speed_as_literal() {
        let dir = temp_dir("rawnav_summaries_csv");
        let path = dir.join("summaries.csv");
        write_summaries_csv(&path, &[summary(TripSpeed::Mph(4.96)), summary(TripSpeed::Undefined)])
            .expect("write");

        let mut reader = csv::Reader::from_path(&path).expect("read");
        let headers = reader.headers().expect("headers").clone();
        let speed_column = headers
            .iter()
            .position(|header| header == "trip_speed_mph")
            .expect("speed column");
        let direct_column = headers
            .iter()
            .position(|header| header == "trip_length_mi_direct")
            .expect("direct length column");
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][speed_column], "4.96");
        assert_eq!(&records[1][speed_column], "undefined");
        assert_eq!(&records[0][direct_column], "");
        fs::remove_dir_all(&dir).ok();
    }
}
