//! Space-time trajectories clipped to a corridor segment.
//!
//! Each trip is matched to the segment's start and end boundary with the same
//! nearest-point rule as stops. Points between the two matches are re-based so
//! that distance and time both start at zero on the start boundary.

use std::collections::BTreeMap;

use compact_str::CompactString;
use tracing::{debug, info};

use rawnav_model::{BoundaryPosition, SegmentBoundary, SegmentTracePoint, TracePoint, TripKey};

use crate::grouping::TripTrace;
use crate::projection::{LocalTangentPlane, METERS_TO_FEET};
use crate::spatial_index::TraceIndex;
use crate::{InputError, Notice, NoticeContainer};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDefinition {
    pub name: CompactString,
    pub start: SegmentBoundary,
    pub end: SegmentBoundary,
}

/// Pairs boundary rows into segments, in name order.
///
/// Boundaries must have finite coordinates.
pub fn segment_definitions(
    boundaries: &[SegmentBoundary],
) -> Result<Vec<SegmentDefinition>, InputError> {
    let mut by_name: BTreeMap<&str, Vec<&SegmentBoundary>> = BTreeMap::new();
    for boundary in boundaries {
        by_name.entry(boundary.name.as_str()).or_default().push(boundary);
    }
    by_name
        .into_iter()
        .map(|(name, rows)| {
            let pick = |position: BoundaryPosition| {
                let mut found = rows.iter().filter(|row| row.position == position);
                match (found.next(), found.next()) {
                    (Some(row), None) if !(row.lat.is_finite() && row.long.is_finite()) => {
                        Err(InputError::NonFiniteBoundary {
                            segment: name.to_string(),
                        })
                    }
                    (Some(row), None) => Ok((*row).clone()),
                    _ => Err(InputError::IncompleteSegment {
                        segment: name.to_string(),
                    }),
                }
            };
            Ok(SegmentDefinition {
                name: name.into(),
                start: pick(BoundaryPosition::Start)?,
                end: pick(BoundaryPosition::End)?,
            })
        })
        .collect()
}

/// Nearest trace point to one boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHit {
    /// Position in the trip's ordered points.
    pub position: usize,
    pub distance_ft: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMatch {
    pub trip: TripKey,
    pub start: BoundaryHit,
    pub end: BoundaryHit,
}

impl BoundaryMatch {
    pub fn max_distance_ft(&self) -> f64 {
        self.start.distance_ft.max(self.end.distance_ft)
    }
}

fn match_trip_boundaries(
    segment: &SegmentDefinition,
    trip: &TripTrace,
    plane: &LocalTangentPlane,
) -> Option<BoundaryMatch> {
    let index = TraceIndex::new(&trip.points, plane);
    let hit = |boundary: &SegmentBoundary| {
        index
            .nearest(plane.project(boundary.lat, boundary.long))
            .map(|(position, distance_m)| BoundaryHit {
                position,
                distance_ft: distance_m * METERS_TO_FEET,
            })
    };
    Some(BoundaryMatch {
        trip: trip.trip.clone(),
        start: hit(&segment.start)?,
        end: hit(&segment.end)?,
    })
}

/// Matches both boundaries of `segment` for every trip that has points.
pub fn match_segment_boundaries(
    segment: &SegmentDefinition,
    trips: &[TripTrace],
    plane: &LocalTangentPlane,
) -> Vec<BoundaryMatch> {
    trips
        .iter()
        .filter_map(|trip| match_trip_boundaries(segment, trip, plane))
        .collect()
}

/// Signed distance from the start boundary to the matched start point.
///
/// Negative when the matched point lies past the boundary in the direction of
/// travel, positive when it lies before it.
fn start_offset_ft(
    segment: &SegmentDefinition,
    matched: &TracePoint,
    distance_ft: f64,
    plane: &LocalTangentPlane,
) -> f64 {
    let start = plane.project(segment.start.lat, segment.start.long);
    let end = plane.project(segment.end.lat, segment.end.long);
    let point = plane.project(matched.lat, matched.long);
    let along = (end[0] - start[0]) * (point[0] - start[0]) + (end[1] - start[1]) * (point[1] - start[1]);
    if along > 0.0 {
        -distance_ft
    } else {
        distance_ft
    }
}

fn clip_trip(
    segment: &SegmentDefinition,
    trip: &TripTrace,
    hits: &BoundaryMatch,
    plane: &LocalTangentPlane,
) -> Vec<SegmentTracePoint> {
    let start_point = &trip.points[hits.start.position];
    let end_point = &trip.points[hits.end.position];
    let offset_ft = start_offset_ft(segment, start_point, hits.start.distance_ft, plane);
    let odom_origin = start_point.odomt_ft + offset_ft;
    let time_origin = start_point.sec_past_st;
    let trip_start = trip.points.iter().find_map(|point| point.start_date_time);

    trip.points
        .iter()
        .filter(|point| {
            point.index_loc >= start_point.index_loc && point.index_loc <= end_point.index_loc
        })
        .map(|point| {
            let started = point.start_date_time.or(trip_start);
            SegmentTracePoint {
                segment: segment.name.clone(),
                filename: point.filename.clone(),
                index_trip_start_in_clean_data: point.index_trip_start_in_clean_data,
                index_loc: point.index_loc,
                lat: point.lat,
                long: point.long,
                odomt_ft: point.odomt_ft,
                sec_past_st: point.sec_past_st,
                odom_adjusted_ft: point.odomt_ft - odom_origin,
                time_adjusted_sec: point.sec_past_st - time_origin,
                hour_interval: started.map(|time| time.hour_interval()),
                day_type: started.map(|time| time.day_type()),
            }
        })
        .collect()
}

/// Builds re-based trajectories for every segment and trip.
///
/// Trips whose farther boundary match is at or beyond `max_distance_ft`, or
/// whose end boundary matched before the start boundary, are left out with a
/// notice. Output is ordered by segment, trip and `index_loc`.
pub fn build_segment_trajectories(
    segments: &[SegmentDefinition],
    trips: &[TripTrace],
    plane: &LocalTangentPlane,
    max_distance_ft: f64,
    notices: &mut NoticeContainer,
) -> Vec<SegmentTracePoint> {
    let mut trajectories = Vec::new();
    for segment in segments {
        let mut kept_trips = 0;
        for trip in trips {
            let Some(hits) = match_trip_boundaries(segment, trip, plane) else {
                continue;
            };
            if hits.max_distance_ft() >= max_distance_ft {
                debug!(trip = %trip.trip, segment = %segment.name, "trip misses segment");
                notices.push(Notice::segment_too_far(
                    &trip.trip,
                    &segment.name,
                    hits.max_distance_ft(),
                    max_distance_ft,
                ));
                continue;
            }
            let start_loc = trip.points[hits.start.position].index_loc;
            let end_loc = trip.points[hits.end.position].index_loc;
            if end_loc < start_loc {
                notices.push(Notice::segment_out_of_order(
                    &trip.trip,
                    &segment.name,
                    start_loc,
                    end_loc,
                ));
                continue;
            }
            trajectories.extend(clip_trip(segment, trip, &hits, plane));
            kept_trips += 1;
        }
        info!(
            "segment {}: {} of {} trips pass both boundaries",
            segment.name,
            kept_trips,
            trips.len()
        );
    }
    trajectories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_trip_traces;
    use crate::notice::{NOTICE_CODE_SEGMENT_OUT_OF_ORDER, NOTICE_CODE_SEGMENT_TOO_FAR};
    use rawnav_model::{DayType, HourInterval, TripStartTime};

    // Roughly 11 m of latitude.
    const STEP: f64 = 0.0001;

    fn boundary(position: BoundaryPosition, lat: f64) -> SegmentBoundary {
        SegmentBoundary {
            name: "piney_branch".into(),
            position,
            lat,
            long: -77.0273,
        }
    }

    fn segment(start_lat: f64, end_lat: f64) -> SegmentDefinition {
        segment_definitions(&[
            boundary(BoundaryPosition::Start, start_lat),
            boundary(BoundaryPosition::End, end_lat),
        ])
        .expect("segment")
        .remove(0)
    }

    /// Southbound trip, one point per step, 36 ft and 5 s apart.
    fn southbound(trip: u32, from_lat: f64, count: u32) -> Vec<TracePoint> {
        (0..count)
            .map(|i| TracePoint {
                filename: "rawnav06457191006.txt".into(),
                index_trip_start_in_clean_data: trip,
                route: "79".into(),
                pattern: 1,
                index_loc: i,
                lat: from_lat - i as f64 * STEP,
                long: -77.0273,
                odomt_ft: i as f64 * 36.0,
                sec_past_st: i as f64 * 5.0,
                heading: None,
                start_date_time: TripStartTime::parse("2019-10-07 07:30:00").ok(),
            })
            .collect()
    }

    #[test]
    fn pairs_boundaries_into_segments() {
        let mut rows = vec![
            boundary(BoundaryPosition::End, 38.9629),
            boundary(BoundaryPosition::Start, 38.9695),
        ];
        let segments = segment_definitions(&rows).expect("segments");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start.lat, 38.9695);

        rows.push(boundary(BoundaryPosition::End, 38.9600));
        assert!(matches!(
            segment_definitions(&rows),
            Err(InputError::IncompleteSegment { .. })
        ));

        let nan_start = vec![
            boundary(BoundaryPosition::Start, f64::NAN),
            boundary(BoundaryPosition::End, 38.9629),
        ];
        assert!(matches!(
            segment_definitions(&nan_start),
            Err(InputError::NonFiniteBoundary { .. })
        ));
    }

    #[test]
    fn clips_and_rebases_trajectory() {
        let plane = LocalTangentPlane::new(38.966, -77.0273);
        let trips = group_trip_traces(&southbound(944, 38.9700, 60));
        // Start sits on point 5, end on point 45.
        let seg = segment(38.9700 - 5.0 * STEP, 38.9700 - 45.0 * STEP);
        let mut notices = NoticeContainer::new();

        let points = build_segment_trajectories(&[seg], &trips, &plane, 70.0, &mut notices);

        assert!(notices.is_empty());
        assert_eq!(points.len(), 41);
        assert_eq!(points[0].index_loc, 5);
        assert_eq!(points[40].index_loc, 45);
        assert!(points[0].odom_adjusted_ft.abs() < 1e-6);
        assert_eq!(points[0].time_adjusted_sec, 0.0);
        assert!((points[40].odom_adjusted_ft - 40.0 * 36.0).abs() < 1e-6);
        assert_eq!(points[40].time_adjusted_sec, 200.0);
        assert_eq!(points[0].hour_interval, Some(HourInterval::AmPeak));
        assert_eq!(points[0].day_type, Some(DayType::Weekday));
    }

    #[test]
    fn offset_is_negative_when_match_is_past_start() {
        let plane = LocalTangentPlane::new(38.966, -77.0273);
        let trips = group_trip_traces(&southbound(1, 38.9700, 20));
        // Boundary a quarter step north of point 5: point 5 lies past it.
        let seg = segment(38.9700 - 4.75 * STEP, 38.9700 - 15.0 * STEP);
        let hits = match_segment_boundaries(&seg, &trips, &plane);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start.position, 5);

        let points = clip_trip(&seg, &trips[0], &hits[0], &plane);
        // The boundary itself is behind point 5, so point 5 is already
        // a few feet into the segment.
        assert!(points[0].odom_adjusted_ft > 0.0);
        assert!((points[0].odom_adjusted_ft - hits[0].start.distance_ft).abs() < 1e-9);
    }

    #[test]
    fn drops_trips_that_miss_or_reverse_the_segment() {
        let plane = LocalTangentPlane::new(38.966, -77.0273);
        let mut notices = NoticeContainer::new();

        let far = segment(38.9700, 38.9600);
        let short_trip = group_trip_traces(&southbound(2, 38.9700, 10));
        let points = build_segment_trajectories(&[far], &short_trip, &plane, 70.0, &mut notices);
        assert!(points.is_empty());
        assert_eq!(notices.count_code(NOTICE_CODE_SEGMENT_TOO_FAR), 1);

        let reversed = segment(38.9700 - 8.0 * STEP, 38.9700 - 2.0 * STEP);
        let points = build_segment_trajectories(&[reversed], &short_trip, &plane, 70.0, &mut notices);
        assert!(points.is_empty());
        assert_eq!(notices.count_code(NOTICE_CODE_SEGMENT_OUT_OF_ORDER), 1);
    }
}
