pub mod cleanup;
pub mod engine;
mod error;
pub mod grouping;
pub mod input;
pub mod matcher;
pub mod notice;
pub mod progress;
pub mod projection;
pub mod segment;
mod settings;
pub mod spatial_index;
pub mod summary;

pub use cleanup::{
    drop_far_matches, repair_monotonic_order, FilterOutcome, OrderViolation, RepairOutcome,
};
pub use engine::{projection_plane, run_pipeline, PipelineOutcome, StageCounts};
pub use error::{InputError, MatchError};
pub use input::{read_csv_bytes, read_csv_file, CsvTable, RawnavDataset};
pub use matcher::{match_nearest, match_trips};
pub use notice::{Notice, NoticeContainer, NoticeSeverity};
pub use progress::{NoOpProgressHandler, ProgressHandler};
pub use projection::{LocalTangentPlane, METERS_TO_FEET};
pub use segment::{build_segment_trajectories, match_segment_boundaries, SegmentDefinition};
pub use settings::{
    MatchSettings, ProjectionOrigin, DEFAULT_MAX_SEGMENT_DISTANCE_FT, DEFAULT_MAX_STOP_DISTANCE_FT,
};
pub use summary::{build_trip_summaries, first_last_stops, summarize_trip, trip_speed_mph};
