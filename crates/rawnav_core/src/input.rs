//! CSV loading for trace, schedule stop and segment boundary tables.
//!
//! Upstream exports are written by pandas in a mix of conventions
//! (`IndexTripStartInCleanData`, `OdomtFt`, `stop_lat`) and usually carry an
//! unnamed index column. Headers are normalised to snake_case here so the
//! matcher only ever sees the fixed schema.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use rawnav_model::{ReferencePoint, SegmentBoundary, TracePoint, TripKey};

use crate::segment::{segment_definitions, SegmentDefinition};
use crate::{InputError, Notice, NoticeContainer};

pub const TRACE_REQUIRED_COLUMNS: &[&str] = &[
    "filename",
    "index_trip_start_in_clean_data",
    "route",
    "pattern",
    "index_loc",
    "lat",
    "long",
    "odomt_ft",
    "sec_past_st",
];

pub const REFERENCE_REQUIRED_COLUMNS: &[&str] =
    &["route", "pattern", "stop_sort_order", "stop_lat", "stop_lon"];

pub const BOUNDARY_REQUIRED_COLUMNS: &[&str] = &["name", "position", "lat", "long"];

#[derive(Debug, Clone)]
pub struct CsvTable<T> {
    pub headers: Vec<String>,
    pub rows: Vec<T>,
    pub row_numbers: Vec<u64>,
}

impl<T> Default for CsvTable<T> {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            row_numbers: Vec::new(),
        }
    }
}

impl<T> CsvTable<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `IndexTripStartInCleanData` -> `index_trip_start_in_clean_data`.
pub fn to_snake_case(header: &str) -> String {
    let chars: Vec<char> = header.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '-' || ch == ' ' {
            out.push('_');
            continue;
        }
        if ch.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

fn is_index_column(header: &str) -> bool {
    let trimmed = header.trim();
    trimmed.is_empty() || trimmed.to_ascii_lowercase().starts_with("unnamed:")
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

pub fn read_csv_bytes<T: DeserializeOwned>(
    file_name: &str,
    data: &[u8],
    required_columns: &[&str],
) -> Result<CsvTable<T>, InputError> {
    let csv_error = |source: csv::Error| InputError::Csv {
        file: file_name.to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(strip_utf8_bom(data));

    let raw_headers = reader.headers().map_err(csv_error)?.clone();
    let kept: Vec<usize> = raw_headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !is_index_column(header))
        .map(|(index, _)| index)
        .collect();
    let headers: Vec<String> = kept
        .iter()
        .map(|&index| to_snake_case(&raw_headers[index]))
        .collect();
    if let Some(column) = required_columns
        .iter()
        .find(|column| !headers.iter().any(|header| header == *column))
    {
        return Err(InputError::MissingColumn {
            file: file_name.to_string(),
            column: column.to_string(),
        });
    }
    let header_record = StringRecord::from(headers.clone());

    let mut table = CsvTable {
        headers,
        ..CsvTable::default()
    };
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let row_number = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(index as u64 + 2);
        let projected: StringRecord = kept.iter().map(|&i| record.get(i).unwrap_or("")).collect();
        let row: T = projected
            .deserialize(Some(&header_record))
            .map_err(csv_error)?;
        table.rows.push(row);
        table.row_numbers.push(row_number);
    }
    Ok(table)
}

pub fn read_csv_file<T: DeserializeOwned>(
    path: &Path,
    required_columns: &[&str],
) -> Result<CsvTable<T>, InputError> {
    if !path.exists() {
        return Err(InputError::MissingFile(path.to_path_buf()));
    }
    let data = fs::read(path).map_err(|source| InputError::Io {
        file: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let table = read_csv_bytes(&file_name, &data, required_columns)?;
    info!("loaded {} rows from {}", table.len(), file_name);
    Ok(table)
}

/// Removes every trace row whose (trip, `index_loc`) is not unique.
///
/// Every copy is dropped, not just the extras.
pub fn drop_duplicate_trace_indices(
    traces: Vec<TracePoint>,
    notices: &mut NoticeContainer,
) -> Vec<TracePoint> {
    let mut counts: FxHashMap<(TripKey, u32), usize> = FxHashMap::default();
    for point in &traces {
        *counts.entry((point.trip_key(), point.index_loc)).or_insert(0) += 1;
    }
    let duplicates: BTreeMap<&(TripKey, u32), usize> = counts
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(key, &count)| (key, count))
        .collect();
    if duplicates.is_empty() {
        return traces;
    }

    for ((trip, index_loc), count) in &duplicates {
        notices.push(Notice::duplicate_trace_index(trip, *index_loc, *count));
    }
    let before = traces.len();
    let kept: Vec<TracePoint> = traces
        .into_iter()
        .filter(|point| counts[&(point.trip_key(), point.index_loc)] == 1)
        .collect();
    warn!(
        "dropped {} trace rows sharing an index_loc within a trip",
        before - kept.len()
    );
    kept
}

fn is_finite_position(lat: f64, long: f64) -> bool {
    lat.is_finite() && long.is_finite()
}

/// Removes trace rows whose `lat` or `long` is NaN or infinite.
pub fn drop_non_finite_traces(
    traces: Vec<TracePoint>,
    notices: &mut NoticeContainer,
) -> Vec<TracePoint> {
    let before = traces.len();
    let kept: Vec<TracePoint> = traces
        .into_iter()
        .filter(|point| {
            let finite = is_finite_position(point.lat, point.long);
            if !finite {
                notices.push(Notice::non_finite_trace_point(point));
            }
            finite
        })
        .collect();
    if kept.len() < before {
        warn!("dropped {} trace rows with non-finite coordinates", before - kept.len());
    }
    kept
}

/// Removes schedule stops whose `stop_lat` or `stop_lon` is NaN or infinite.
pub fn drop_non_finite_references(
    references: Vec<ReferencePoint>,
    notices: &mut NoticeContainer,
) -> Vec<ReferencePoint> {
    let before = references.len();
    let kept: Vec<ReferencePoint> = references
        .into_iter()
        .filter(|reference| {
            let finite = is_finite_position(reference.stop_lat, reference.stop_lon);
            if !finite {
                notices.push(Notice::non_finite_reference_point(reference));
            }
            finite
        })
        .collect();
    if kept.len() < before {
        warn!("dropped {} schedule stops with non-finite coordinates", before - kept.len());
    }
    kept
}

/// All tables needed for one run.
#[derive(Debug, Clone, Default)]
pub struct RawnavDataset {
    pub traces: Vec<TracePoint>,
    pub references: Vec<ReferencePoint>,
    pub segments: Vec<SegmentDefinition>,
}

impl RawnavDataset {
    pub fn new(traces: Vec<TracePoint>, references: Vec<ReferencePoint>) -> Self {
        Self {
            traces,
            references,
            segments: Vec::new(),
        }
    }

    pub fn with_boundaries(mut self, boundaries: &[SegmentBoundary]) -> Result<Self, InputError> {
        self.segments = segment_definitions(boundaries)?;
        Ok(self)
    }

    pub fn from_paths(
        trace_path: &Path,
        reference_path: &Path,
        boundary_path: Option<&Path>,
    ) -> Result<Self, InputError> {
        let traces: CsvTable<TracePoint> = read_csv_file(trace_path, TRACE_REQUIRED_COLUMNS)?;
        let references: CsvTable<ReferencePoint> =
            read_csv_file(reference_path, REFERENCE_REQUIRED_COLUMNS)?;
        let dataset = Self::new(traces.rows, references.rows);
        match boundary_path {
            Some(path) => {
                let boundaries: CsvTable<SegmentBoundary> =
                    read_csv_file(path, BOUNDARY_REQUIRED_COLUMNS)?;
                dataset.with_boundaries(&boundaries.rows)
            }
            None => Ok(dataset),
        }
    }
}
