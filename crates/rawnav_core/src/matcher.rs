//! Nearest trace point for every schedule stop of a trip's route pattern.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info};

use rawnav_model::{ReferencePoint, StopMatch, TracePoint};

use crate::grouping::{group_references, group_trip_traces, TripTrace};
use crate::progress::ProgressHandler;
use crate::projection::{LocalTangentPlane, METERS_TO_FEET};
use crate::spatial_index::TraceIndex;
use crate::{Notice, NoticeContainer};

/// Matches each reference point to its nearest trace point.
///
/// Both sets must belong to the same grouping (one trip, one route pattern);
/// no compatibility check is made here. Returns one match per reference point
/// in input order, or nothing when `trace_points` is empty. Reference points
/// and trace points with non-finite coordinates are skipped. Distances are in
/// feet.
pub fn match_nearest(
    reference_points: &[ReferencePoint],
    trace_points: &[TracePoint],
    plane: &LocalTangentPlane,
) -> Vec<StopMatch> {
    let index = TraceIndex::new(trace_points, plane);
    reference_points
        .iter()
        .filter_map(|reference| {
            let query = plane.project(reference.stop_lat, reference.stop_lon);
            let (idx, distance_m) = index.nearest(query)?;
            Some(StopMatch::new(
                reference,
                &trace_points[idx],
                distance_m * METERS_TO_FEET,
            ))
        })
        .collect()
}

/// Matches every trip against the stops of its own route pattern.
///
/// Output is ordered by trip key, then by stop sort order.
pub fn match_trips(
    references: &[ReferencePoint],
    traces: &[TracePoint],
    plane: &LocalTangentPlane,
    notices: &mut NoticeContainer,
    progress: Option<&dyn ProgressHandler>,
) -> Vec<StopMatch> {
    let reference_groups = group_references(references);
    let trip_groups = group_trip_traces(traces);
    if let Some(progress) = progress {
        progress.set_total_groups(trip_groups.len());
    }

    let match_group = |group: &TripTrace| -> Result<Vec<StopMatch>, Notice> {
        let result = match reference_groups.get(&group.route) {
            Some(stops) => {
                debug!(
                    trip = %group.trip,
                    route = %group.route,
                    stops = stops.len(),
                    points = group.points.len(),
                    "matching trip"
                );
                Ok(match_nearest(stops, &group.points, plane))
            }
            None => Err(Notice::missing_reference_group(&group.trip, &group.route)),
        };
        if let Some(progress) = progress {
            progress.increment_group_progress();
        }
        result
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<Vec<StopMatch>, Notice>> =
        trip_groups.par_iter().map(match_group).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<Vec<StopMatch>, Notice>> =
        trip_groups.iter().map(match_group).collect();

    let mut matches = Vec::new();
    let mut skipped = 0;
    for result in results {
        match result {
            Ok(group_matches) => matches.extend(group_matches),
            Err(notice) => {
                skipped += 1;
                notices.push(notice);
            }
        }
    }
    info!(
        "matched {} stops across {} trips ({} trips without schedule stops)",
        matches.len(),
        trip_groups.len() - skipped,
        skipped
    );
    matches
}
