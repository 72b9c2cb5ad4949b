use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use compact_str::CompactString;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const FEET_PER_MILE: f64 = 5280.0;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, thiserror::Error)]
pub enum RawnavParseError {
    #[error("invalid timestamp format: {0}")]
    InvalidTimestampFormat(String),
}

/// Identifies one rawnav trip: the source file plus the row where the trip
/// starts in the cleaned data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripKey {
    pub filename: CompactString,
    pub index_trip_start_in_clean_data: u32,
}

impl TripKey {
    pub fn new(filename: impl Into<CompactString>, index_trip_start_in_clean_data: u32) -> Self {
        Self {
            filename: filename.into(),
            index_trip_start_in_clean_data,
        }
    }
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.index_trip_start_in_clean_data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub route: CompactString,
    pub pattern: u32,
}

impl RouteKey {
    pub fn new(route: impl Into<CompactString>, pattern: u32) -> Self {
        Self {
            route: route.into(),
            pattern,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.route, self.pattern)
    }
}

/// Trip start timestamp as written by the rawnav parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripStartTime(NaiveDateTime);

impl TripStartTime {
    pub fn parse(value: &str) -> Result<Self, RawnavParseError> {
        let trimmed = value.trim();
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .map(Self)
            .ok_or_else(|| RawnavParseError::InvalidTimestampFormat(value.to_string()))
    }

    pub fn hour_interval(&self) -> HourInterval {
        HourInterval::from_hour(self.0.hour())
    }

    pub fn day_type(&self) -> DayType {
        DayType::from_weekday(self.0.weekday())
    }
}

impl fmt::Display for TripStartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl Serialize for TripStartTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TripStartTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TripStartTimeVisitor;

        impl<'de> Visitor<'de> for TripStartTimeVisitor {
            type Value = TripStartTime;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a timestamp in YYYY-MM-DD HH:MM:SS format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TripStartTime, E> {
                TripStartTime::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TripStartTimeVisitor)
    }
}

/// Time-of-day bucket used to group trajectories in space-time diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HourInterval {
    Overnight,
    AmPeak,
    Midday,
    Afternoon,
    PmPeak,
    Evening,
}

impl HourInterval {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => HourInterval::Overnight,
            6..=10 => HourInterval::AmPeak,
            11..=13 => HourInterval::Midday,
            14..=16 => HourInterval::Afternoon,
            17..=19 => HourInterval::PmPeak,
            _ => HourInterval::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HourInterval::Overnight => "[0, 6)",
            HourInterval::AmPeak => "[6, 11)",
            HourInterval::Midday => "[11, 14)",
            HourInterval::Afternoon => "[14, 17)",
            HourInterval::PmPeak => "[17, 20)",
            HourInterval::Evening => "[20, 24)",
        }
    }
}

impl Serialize for HourInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

/// One rawnav AVL fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub filename: CompactString,
    pub index_trip_start_in_clean_data: u32,
    pub route: CompactString,
    pub pattern: u32,
    pub index_loc: u32,
    pub lat: f64,
    pub long: f64,
    pub odomt_ft: f64,
    pub sec_past_st: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub start_date_time: Option<TripStartTime>,
}

impl TracePoint {
    pub fn trip_key(&self) -> TripKey {
        TripKey::new(self.filename.clone(), self.index_trip_start_in_clean_data)
    }

    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.route.clone(), self.pattern)
    }
}

/// A schedule stop on a route pattern, ranked by `stop_sort_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub route: CompactString,
    pub pattern: u32,
    #[serde(default)]
    pub stop_id: Option<CompactString>,
    pub stop_sort_order: u32,
    pub stop_lat: f64,
    pub stop_lon: f64,
    #[serde(default)]
    pub geo_description: Option<String>,
    /// Direct schedule trip length, in feet.
    #[serde(default)]
    pub trip_length: Option<f64>,
    #[serde(default)]
    pub route_text: Option<String>,
}

impl ReferencePoint {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.route.clone(), self.pattern)
    }
}

/// A reference point joined with its nearest trace point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopMatch {
    pub filename: CompactString,
    pub index_trip_start_in_clean_data: u32,
    pub route: CompactString,
    pub pattern: u32,
    pub stop_id: Option<CompactString>,
    pub stop_sort_order: u32,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub geo_description: Option<String>,
    pub index_loc: u32,
    pub lat: f64,
    pub long: f64,
    /// Distance between the stop and the matched trace point, in feet.
    pub dist_nearest_point_from_stop: f64,
}

impl StopMatch {
    pub fn new(reference: &ReferencePoint, trace: &TracePoint, distance_ft: f64) -> Self {
        Self {
            filename: trace.filename.clone(),
            index_trip_start_in_clean_data: trace.index_trip_start_in_clean_data,
            route: reference.route.clone(),
            pattern: reference.pattern,
            stop_id: reference.stop_id.clone(),
            stop_sort_order: reference.stop_sort_order,
            stop_lat: reference.stop_lat,
            stop_lon: reference.stop_lon,
            geo_description: reference.geo_description.clone(),
            index_loc: trace.index_loc,
            lat: trace.lat,
            long: trace.long,
            dist_nearest_point_from_stop: distance_ft,
        }
    }

    pub fn trip_key(&self) -> TripKey {
        TripKey::new(self.filename.clone(), self.index_trip_start_in_clean_data)
    }

    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.route.clone(), self.pattern)
    }
}

/// Average trip speed. A zero-length duration yields `Undefined` rather than
/// an infinite or NaN value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TripSpeed {
    Mph(f64),
    Undefined,
}

impl TripSpeed {
    pub fn mph(&self) -> Option<f64> {
        match self {
            TripSpeed::Mph(value) => Some(*value),
            TripSpeed::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, TripSpeed::Mph(_))
    }
}

impl fmt::Display for TripSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripSpeed::Mph(value) => write!(f, "{}", value),
            TripSpeed::Undefined => f.write_str("undefined"),
        }
    }
}

impl Serialize for TripSpeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TripSpeed::Mph(value) => serializer.serialize_f64(*value),
            TripSpeed::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl<'de> Deserialize<'de> for TripSpeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TripSpeedVisitor;

        impl<'de> Visitor<'de> for TripSpeedVisitor {
            type Value = TripSpeed;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a speed in mph or \"undefined\"")
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<TripSpeed, E> {
                Ok(TripSpeed::Mph(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<TripSpeed, E> {
                Ok(TripSpeed::Mph(value as f64))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<TripSpeed, E> {
                Ok(TripSpeed::Mph(value as f64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TripSpeed, E> {
                let trimmed = value.trim();
                if trimmed.eq_ignore_ascii_case("undefined") {
                    return Ok(TripSpeed::Undefined);
                }
                trimmed
                    .parse::<f64>()
                    .map(TripSpeed::Mph)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(TripSpeedVisitor)
    }
}

/// Per-trip summary bounded by the first and last matched stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub filename: CompactString,
    pub index_trip_start_in_clean_data: u32,
    pub route: CompactString,
    pub pattern: u32,
    pub route_text: Option<String>,
    pub first_stop_sort_order: u32,
    pub last_stop_sort_order: u32,
    pub index_loc_first_stop: u32,
    pub index_loc_last_stop: u32,
    pub start_odom_ft: f64,
    pub end_odom_ft: f64,
    pub trip_dist_mi: f64,
    pub start_sec: f64,
    pub end_sec: f64,
    pub trip_dur_sec: f64,
    pub start_lat: f64,
    pub end_lat: f64,
    pub start_long: f64,
    pub end_long: f64,
    pub dist_first_stop_ft: f64,
    pub dist_last_stop_ft: f64,
    pub trip_length_mi_direct: Option<f64>,
    pub trip_speed_mph: TripSpeed,
    /// False when repair removed the route's first or last stop for this trip.
    pub covers_route_endpoints: bool,
}

impl TripSummary {
    pub fn trip_key(&self) -> TripKey {
        TripKey::new(self.filename.clone(), self.index_trip_start_in_clean_data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPosition {
    Start,
    End,
}

/// One end of a corridor segment used to clip trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBoundary {
    pub name: CompactString,
    pub position: BoundaryPosition,
    pub lat: f64,
    pub long: f64,
}

/// A trace point inside a segment, re-based to the segment start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentTracePoint {
    pub segment: CompactString,
    pub filename: CompactString,
    pub index_trip_start_in_clean_data: u32,
    pub index_loc: u32,
    pub lat: f64,
    pub long: f64,
    pub odomt_ft: f64,
    pub sec_past_st: f64,
    pub odom_adjusted_ft: f64,
    pub time_adjusted_sec: f64,
    pub hour_interval: Option<HourInterval>,
    pub day_type: Option<DayType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trip_start_time_formats() {
        let spaced = TripStartTime::parse("2019-10-05 07:15:00").expect("spaced");
        let iso = TripStartTime::parse("2019-10-05T07:15:00.000").expect("iso");
        assert_eq!(spaced, iso);
        assert_eq!(spaced.to_string(), "2019-10-05 07:15:00");
        assert!(TripStartTime::parse("10/05/2019").is_err());
    }

    #[test]
    fn classifies_hour_interval_and_day_type() {
        let saturday_morning = TripStartTime::parse("2019-10-05 07:15:00").unwrap();
        assert_eq!(saturday_morning.hour_interval(), HourInterval::AmPeak);
        assert_eq!(saturday_morning.day_type(), DayType::Weekend);

        let monday_night = TripStartTime::parse("2019-10-07 22:40:10").unwrap();
        assert_eq!(monday_night.hour_interval(), HourInterval::Evening);
        assert_eq!(monday_night.day_type(), DayType::Weekday);

        assert_eq!(HourInterval::from_hour(5), HourInterval::Overnight);
        assert_eq!(HourInterval::from_hour(13), HourInterval::Midday);
        assert_eq!(HourInterval::from_hour(19), HourInterval::PmPeak);
    }

    #[test]
    fn bucket_edges_fall_in_the_earlier_interval() {
        let edges: Vec<&str> = [5, 10, 13, 16, 19, 23]
            .into_iter()
            .map(|hour| HourInterval::from_hour(hour).as_str())
            .collect();
        assert_eq!(
            edges,
            vec!["[0, 6)", "[6, 11)", "[11, 14)", "[14, 17)", "[17, 20)", "[20, 24)"]
        );
    }

    #[test]
    fn trip_speed_serializes_undefined_as_literal() {
        assert_eq!(
            serde_json::to_string(&TripSpeed::Undefined).unwrap(),
            "\"undefined\""
        );
        assert_eq!(serde_json::to_string(&TripSpeed::Mph(12.5)).unwrap(), "12.5");

        let parsed: TripSpeed = serde_json::from_str("\"undefined\"").unwrap();
        assert_eq!(parsed, TripSpeed::Undefined);
        let parsed: TripSpeed = serde_json::from_str("9.75").unwrap();
        assert_eq!(parsed.mph(), Some(9.75));
    }

    #[test]
    fn deserializes_trace_point_with_optional_columns() {
        let data = "filename,index_trip_start_in_clean_data,route,pattern,index_loc,lat,long,odomt_ft,sec_past_st,heading,start_date_time\n\
                    rawnav06435191012.txt,944,79,1,12,38.96,-77.02,1500.5,120,,2019-10-12 05:10:00\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<TracePoint> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .expect("deserialize");

        assert_eq!(rows.len(), 1);
        let point = &rows[0];
        assert_eq!(point.trip_key(), TripKey::new("rawnav06435191012.txt", 944));
        assert_eq!(point.route_key().to_string(), "79/01");
        assert!(point.heading.is_none());
        assert_eq!(
            point.start_date_time.map(|time| time.hour_interval()),
            Some(HourInterval::Overnight)
        );
    }
}
