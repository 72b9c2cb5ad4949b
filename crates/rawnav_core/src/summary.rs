//! Per-trip distance, duration and speed between the first and last matched
//! schedule stop.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use rawnav_model::{
    ReferencePoint, RouteKey, StopMatch, TracePoint, TripKey, TripSpeed, TripSummary,
    FEET_PER_MILE,
};

use crate::grouping::group_by_trip;
use crate::{Notice, NoticeContainer};

/// Matches with the lowest and highest sort order for one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripEndpoints {
    pub first: StopMatch,
    pub last: StopMatch,
}

impl TripEndpoints {
    pub fn trip_key(&self) -> TripKey {
        self.first.trip_key()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointsOutcome {
    pub endpoints: Vec<TripEndpoints>,
    /// Trips with fewer than two matches, with their remaining count.
    pub insufficient: Vec<(TripKey, usize)>,
}

/// Schedule attributes shared by every stop of a route pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMeta {
    pub route_text: Option<String>,
    pub trip_length_ft: Option<f64>,
    pub first_stop_sort_order: u32,
    pub last_stop_sort_order: u32,
}

pub fn route_meta(references: &[ReferencePoint]) -> FxHashMap<RouteKey, RouteMeta> {
    let mut meta: FxHashMap<RouteKey, RouteMeta> = FxHashMap::default();
    for reference in references {
        let entry = meta.entry(reference.route_key()).or_insert_with(|| RouteMeta {
            route_text: None,
            trip_length_ft: None,
            first_stop_sort_order: reference.stop_sort_order,
            last_stop_sort_order: reference.stop_sort_order,
        });
        entry.first_stop_sort_order = entry.first_stop_sort_order.min(reference.stop_sort_order);
        entry.last_stop_sort_order = entry.last_stop_sort_order.max(reference.stop_sort_order);
        if entry.route_text.is_none() {
            entry.route_text = reference.route_text.clone();
        }
        if entry.trip_length_ft.is_none() {
            entry.trip_length_ft = reference.trip_length;
        }
    }
    meta
}

pub fn first_last_stops(matches: &[StopMatch]) -> EndpointsOutcome {
    let mut by_trip: BTreeMap<TripKey, Vec<&StopMatch>> = BTreeMap::new();
    for stop_match in matches {
        by_trip
            .entry(stop_match.trip_key())
            .or_default()
            .push(stop_match);
    }

    let mut outcome = EndpointsOutcome::default();
    for (trip, rows) in by_trip {
        if rows.len() < 2 {
            outcome.insufficient.push((trip, rows.len()));
            continue;
        }
        let first = rows.iter().min_by_key(|row| row.stop_sort_order);
        let last = rows.iter().max_by_key(|row| row.stop_sort_order);
        if let (Some(first), Some(last)) = (first, last) {
            outcome.endpoints.push(TripEndpoints {
                first: (*first).clone(),
                last: (*last).clone(),
            });
        }
    }
    outcome
}

pub fn trip_speed_mph(trip_dist_mi: f64, trip_dur_sec: f64) -> TripSpeed {
    if trip_dur_sec == 0.0 || !trip_dur_sec.is_finite() || !trip_dist_mi.is_finite() {
        return TripSpeed::Undefined;
    }
    TripSpeed::Mph(round2(3600.0 * trip_dist_mi / trip_dur_sec))
}

/// Summarizes the part of `trace` between the two endpoint matches.
///
/// `trace` must be the trip's points ordered by `index_loc`. Returns `None`
/// when no trace point falls inside the bounded range.
pub fn summarize_trip(
    endpoints: &TripEndpoints,
    trace: &[&TracePoint],
    meta: Option<&RouteMeta>,
) -> Option<TripSummary> {
    let lower = endpoints.first.index_loc;
    let upper = endpoints.last.index_loc;
    let bounded: Vec<&TracePoint> = trace
        .iter()
        .copied()
        .filter(|point| point.index_loc >= lower && point.index_loc <= upper)
        .collect();
    let (start, end) = (bounded.first()?, bounded.last()?);

    let (start_odom_ft, end_odom_ft) = min_max(bounded.iter().map(|point| point.odomt_ft));
    let (start_sec, end_sec) = min_max(bounded.iter().map(|point| point.sec_past_st));
    let trip_dist_mi = (end_odom_ft - start_odom_ft) / FEET_PER_MILE;
    let trip_dur_sec = end_sec - start_sec;

    let first = &endpoints.first;
    let last = &endpoints.last;
    let covers_route_endpoints = meta.map_or(true, |meta| {
        first.stop_sort_order == meta.first_stop_sort_order
            && last.stop_sort_order == meta.last_stop_sort_order
    });

    Some(TripSummary {
        filename: first.filename.clone(),
        index_trip_start_in_clean_data: first.index_trip_start_in_clean_data,
        route: first.route.clone(),
        pattern: first.pattern,
        route_text: meta.and_then(|meta| meta.route_text.clone()),
        first_stop_sort_order: first.stop_sort_order,
        last_stop_sort_order: last.stop_sort_order,
        index_loc_first_stop: lower,
        index_loc_last_stop: upper,
        start_odom_ft,
        end_odom_ft,
        trip_dist_mi: round2(trip_dist_mi),
        start_sec,
        end_sec,
        trip_dur_sec,
        start_lat: start.lat,
        end_lat: end.lat,
        start_long: start.long,
        end_long: end.long,
        dist_first_stop_ft: round2(first.dist_nearest_point_from_stop),
        dist_last_stop_ft: round2(last.dist_nearest_point_from_stop),
        trip_length_mi_direct: meta
            .and_then(|meta| meta.trip_length_ft)
            .map(|feet| round2(feet / FEET_PER_MILE)),
        trip_speed_mph: trip_speed_mph(trip_dist_mi, trip_dur_sec),
        covers_route_endpoints,
    })
}

/// Builds one summary per trip that kept at least two matches.
///
/// Trips that appear in `traces` for a scheduled route pattern but have no
/// match left at all are reported as insufficient too.
pub fn build_trip_summaries(
    matches: &[StopMatch],
    traces: &[TracePoint],
    references: &[ReferencePoint],
    notices: &mut NoticeContainer,
) -> Vec<TripSummary> {
    let meta = route_meta(references);
    let traces_by_trip = group_by_trip(traces);
    let endpoints = first_last_stops(matches);

    let matched_trips: BTreeSet<TripKey> = matches.iter().map(StopMatch::trip_key).collect();
    let mut unmatched = BTreeSet::new();
    for point in traces {
        if meta.contains_key(&point.route_key()) {
            let trip = point.trip_key();
            if !matched_trips.contains(&trip) {
                unmatched.insert(trip);
            }
        }
    }
    for trip in &unmatched {
        notices.push(Notice::insufficient_matches(trip, 0));
    }
    for (trip, remaining) in &endpoints.insufficient {
        notices.push(Notice::insufficient_matches(trip, *remaining));
    }
    if !endpoints.insufficient.is_empty() || !unmatched.is_empty() {
        warn!(
            "{} trips have fewer than two matched stops and are not summarized",
            endpoints.insufficient.len() + unmatched.len()
        );
    }

    let mut summaries = Vec::with_capacity(endpoints.endpoints.len());
    for trip_endpoints in &endpoints.endpoints {
        let trip = trip_endpoints.trip_key();
        let route = trip_endpoints.first.route_key();
        let route_meta = meta.get(&route);
        let trace = traces_by_trip
            .get(&trip)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let Some(summary) = summarize_trip(trip_endpoints, trace, route_meta) else {
            notices.push(Notice::trip_without_trace(&trip));
            continue;
        };
        if !summary.covers_route_endpoints {
            notices.push(Notice::missing_route_endpoint(
                &trip,
                &route,
                summary.first_stop_sort_order,
                summary.last_stop_sort_order,
            ));
        }
        if !summary.trip_speed_mph.is_defined() {
            notices.push(Notice::undefined_trip_speed(&trip, summary.trip_dist_mi));
        }
        summaries.push(summary);
    }
    info!("built {} trip summaries", summaries.len());
    summaries
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
