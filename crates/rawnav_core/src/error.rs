use std::path::PathBuf;

use rawnav_model::TripKey;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    MissingFile(PathBuf),
    #[error("io error reading {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("{file} is missing required column {column}")]
    MissingColumn { file: String, column: String },
    #[error("segment {segment} needs exactly one start and one end boundary")]
    IncompleteSegment { segment: String },
    #[error("segment {segment} has a boundary with a non-finite coordinate")]
    NonFiniteBoundary { segment: String },
    #[error("invalid settings in {file}: {source}")]
    Settings {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures that indicate an upstream grouping bug rather than noisy data.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("trip {trip} has more than one match for stop sort order {stop_sort_order}")]
    DuplicateSortOrder { trip: TripKey, stop_sort_order: u32 },
}
