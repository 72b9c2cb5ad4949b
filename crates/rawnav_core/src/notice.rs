use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rawnav_model::{ReferencePoint, RouteKey, StopMatch, TracePoint, TripKey};

pub const NOTICE_CODE_MATCH_TOO_FAR: &str = "match_too_far_from_stop";
pub const NOTICE_CODE_STOP_ORDER_VIOLATION: &str = "stop_match_out_of_order";
pub const NOTICE_CODE_INSUFFICIENT_MATCHES: &str = "insufficient_matches_for_trip";
pub const NOTICE_CODE_MISSING_ROUTE_ENDPOINT: &str = "missing_route_endpoint";
pub const NOTICE_CODE_MISSING_REFERENCE_GROUP: &str = "missing_reference_group";
pub const NOTICE_CODE_UNDEFINED_TRIP_SPEED: &str = "undefined_trip_speed";
pub const NOTICE_CODE_TRIP_WITHOUT_TRACE: &str = "trip_without_bounded_trace";
pub const NOTICE_CODE_DUPLICATE_TRACE_INDEX: &str = "duplicate_trace_index";
pub const NOTICE_CODE_SEGMENT_TOO_FAR: &str = "segment_boundary_too_far";
pub const NOTICE_CODE_SEGMENT_OUT_OF_ORDER: &str = "segment_boundaries_out_of_order";
pub const NOTICE_CODE_NON_FINITE_COORDINATE: &str = "non_finite_coordinate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Error,
    Warning,
    Info,
}

/// A recoverable data-quality condition found during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub code: String,
    pub severity: NoticeSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_order: Vec<String>,
}

impl Notice {
    pub fn new(
        code: impl Into<String>,
        severity: NoticeSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            context: BTreeMap::new(),
            field_order: Vec::new(),
        }
    }

    pub fn match_too_far(stop_match: &StopMatch, max_distance_ft: f64) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_MATCH_TOO_FAR,
            NoticeSeverity::Info,
            "nearest trace point is too far from stop",
        );
        insert_match_fields(&mut notice, stop_match);
        notice.insert_context_field("distanceFt", stop_match.dist_nearest_point_from_stop);
        notice.insert_context_field("maxDistanceFt", max_distance_ft);
        notice
    }

    pub fn stop_order_violation(stop_match: &StopMatch, previous: &StopMatch) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_STOP_ORDER_VIOLATION,
            NoticeSeverity::Info,
            "stop matched an earlier trace point than the previous stop",
        );
        insert_match_fields(&mut notice, stop_match);
        notice.insert_context_field("previousStopSortOrder", previous.stop_sort_order);
        notice.insert_context_field("previousIndexLoc", previous.index_loc);
        notice
    }

    pub fn insufficient_matches(trip: &TripKey, remaining: usize) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_INSUFFICIENT_MATCHES,
            NoticeSeverity::Warning,
            "trip has fewer than two matched stops and cannot be summarized",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("remainingMatches", remaining);
        notice
    }

    pub fn missing_route_endpoint(
        trip: &TripKey,
        route: &RouteKey,
        first_stop_sort_order: u32,
        last_stop_sort_order: u32,
    ) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_MISSING_ROUTE_ENDPOINT,
            NoticeSeverity::Warning,
            "trip lost the first or last stop of its route pattern",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("routePattern", route.to_string());
        notice.insert_context_field("firstStopSortOrder", first_stop_sort_order);
        notice.insert_context_field("lastStopSortOrder", last_stop_sort_order);
        notice
    }

    pub fn missing_reference_group(trip: &TripKey, route: &RouteKey) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_MISSING_REFERENCE_GROUP,
            NoticeSeverity::Warning,
            "no schedule stops for the trip's route pattern",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("routePattern", route.to_string());
        notice
    }

    pub fn undefined_trip_speed(trip: &TripKey, trip_dist_mi: f64) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_UNDEFINED_TRIP_SPEED,
            NoticeSeverity::Warning,
            "trip duration is zero so speed is undefined",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("tripDistMi", trip_dist_mi);
        notice
    }

    pub fn trip_without_trace(trip: &TripKey) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_TRIP_WITHOUT_TRACE,
            NoticeSeverity::Warning,
            "no trace points between the first and last matched stop",
        );
        insert_trip_fields(&mut notice, trip);
        notice
    }

    pub fn duplicate_trace_index(trip: &TripKey, index_loc: u32, count: usize) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_DUPLICATE_TRACE_INDEX,
            NoticeSeverity::Warning,
            "trace index appears more than once in a trip",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("indexLoc", index_loc);
        notice.insert_context_field("count", count);
        notice
    }

    pub fn non_finite_trace_point(point: &TracePoint) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_NON_FINITE_COORDINATE,
            NoticeSeverity::Warning,
            "coordinate is not a finite number",
        );
        insert_trip_fields(&mut notice, &point.trip_key());
        notice.insert_context_field("indexLoc", point.index_loc);
        notice.insert_context_field("lat", point.lat.to_string());
        notice.insert_context_field("long", point.long.to_string());
        notice
    }

    pub fn non_finite_reference_point(reference: &ReferencePoint) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_NON_FINITE_COORDINATE,
            NoticeSeverity::Warning,
            "coordinate is not a finite number",
        );
        notice.insert_context_field("routePattern", reference.route_key().to_string());
        notice.insert_context_field("stopId", reference.stop_id.as_deref());
        notice.insert_context_field("stopSortOrder", reference.stop_sort_order);
        notice.insert_context_field("lat", reference.stop_lat.to_string());
        notice.insert_context_field("long", reference.stop_lon.to_string());
        notice
    }

    pub fn segment_too_far(
        trip: &TripKey,
        segment: &str,
        distance_ft: f64,
        max_distance_ft: f64,
    ) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_SEGMENT_TOO_FAR,
            NoticeSeverity::Info,
            "trip does not pass close enough to the segment boundaries",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("segment", segment);
        notice.insert_context_field("distanceFt", distance_ft);
        notice.insert_context_field("maxDistanceFt", max_distance_ft);
        notice
    }

    pub fn segment_out_of_order(trip: &TripKey, segment: &str, start: u32, end: u32) -> Self {
        let mut notice = Notice::new(
            NOTICE_CODE_SEGMENT_OUT_OF_ORDER,
            NoticeSeverity::Warning,
            "segment end matched before segment start",
        );
        insert_trip_fields(&mut notice, trip);
        notice.insert_context_field("segment", segment);
        notice.insert_context_field("startIndexLoc", start);
        notice.insert_context_field("endIndexLoc", end);
        notice
    }

    pub fn insert_context_field<V: Serialize>(&mut self, name: impl Into<String>, value: V) {
        let key = name.into();
        let serialized = serde_json::to_value(value).unwrap_or_else(|_| Value::Null);
        if !self.field_order.iter().any(|item| item == &key) {
            self.field_order.push(key.clone());
        }
        self.context.insert(key, serialized);
    }
}

fn insert_trip_fields(notice: &mut Notice, trip: &TripKey) {
    notice.insert_context_field("filename", trip.filename.as_str());
    notice.insert_context_field("indexTripStartInCleanData", trip.index_trip_start_in_clean_data);
}

fn insert_match_fields(notice: &mut Notice, stop_match: &StopMatch) {
    insert_trip_fields(notice, &stop_match.trip_key());
    notice.insert_context_field("stopId", stop_match.stop_id.as_deref());
    notice.insert_context_field("stopSortOrder", stop_match.stop_sort_order);
    notice.insert_context_field("indexLoc", stop_match.index_loc);
}

#[derive(Debug, Default)]
pub struct NoticeContainer {
    notices: Vec<Notice>,
}

impl NoticeContainer {
    pub fn new() -> Self {
        Self {
            notices: Vec::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.notices.iter().filter(|notice| notice.code == code).count()
    }
}

impl Extend<Notice> for NoticeContainer {
    fn extend<I: IntoIterator<Item = Notice>>(&mut self, iter: I) {
        self.notices.extend(iter);
    }
}
