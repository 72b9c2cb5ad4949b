use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use rawnav_model::{ReferencePoint, RouteKey, TracePoint, TripKey};

/// Trace points of one trip on one route pattern, ordered by `index_loc`.
#[derive(Debug, Clone)]
pub struct TripTrace {
    pub trip: TripKey,
    pub route: RouteKey,
    pub points: Vec<TracePoint>,
}

/// Groups trace points by (trip, route pattern) in key order.
pub fn group_trip_traces(traces: &[TracePoint]) -> Vec<TripTrace> {
    let mut groups: BTreeMap<(TripKey, RouteKey), Vec<TracePoint>> = BTreeMap::new();
    for point in traces {
        groups
            .entry((point.trip_key(), point.route_key()))
            .or_default()
            .push(point.clone());
    }
    groups
        .into_iter()
        .map(|((trip, route), mut points)| {
            points.sort_by_key(|point| point.index_loc);
            TripTrace {
                trip,
                route,
                points,
            }
        })
        .collect()
}

/// Groups trace points by trip only, ordered by `index_loc`.
pub fn group_by_trip(traces: &[TracePoint]) -> BTreeMap<TripKey, Vec<&TracePoint>> {
    let mut groups: BTreeMap<TripKey, Vec<&TracePoint>> = BTreeMap::new();
    for point in traces {
        groups.entry(point.trip_key()).or_default().push(point);
    }
    for points in groups.values_mut() {
        points.sort_by_key(|point| point.index_loc);
    }
    groups
}

/// Groups reference points by route pattern, ordered by `stop_sort_order`.
pub fn group_references(references: &[ReferencePoint]) -> FxHashMap<RouteKey, Vec<ReferencePoint>> {
    let mut groups: FxHashMap<RouteKey, Vec<ReferencePoint>> = FxHashMap::default();
    for reference in references {
        groups
            .entry(reference.route_key())
            .or_default()
            .push(reference.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|reference| reference.stop_sort_order);
    }
    groups
}
