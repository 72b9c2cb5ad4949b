use serde::Serialize;
use tracing::info;

use rawnav_model::{ReferencePoint, SegmentTracePoint, StopMatch, TracePoint, TripSummary};

use crate::cleanup::{drop_far_matches, repair_monotonic_order};
use crate::grouping::group_trip_traces;
use crate::input::{
    drop_duplicate_trace_indices, drop_non_finite_references, drop_non_finite_traces,
    RawnavDataset,
};
use crate::matcher::match_trips;
use crate::progress::ProgressHandler;
use crate::projection::LocalTangentPlane;
use crate::segment::build_segment_trajectories;
use crate::summary::build_trip_summaries;
use crate::{MatchError, MatchSettings, NoticeContainer};

/// Row counts before and after each stage of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub trace_rows: usize,
    pub trace_rows_unique: usize,
    pub reference_points: usize,
    pub reference_points_valid: usize,
    pub trips: usize,
    pub matches: usize,
    pub matches_within_distance: usize,
    pub matches_in_order: usize,
    pub summaries: usize,
    pub segment_points: usize,
}

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub matches: Vec<StopMatch>,
    pub summaries: Vec<TripSummary>,
    pub trajectories: Vec<SegmentTracePoint>,
    pub notices: NoticeContainer,
    pub stage_counts: StageCounts,
}

/// Settings origin first, then the mean stop position, then the first fix.
pub fn projection_plane(
    references: &[ReferencePoint],
    traces: &[TracePoint],
    settings: &MatchSettings,
) -> LocalTangentPlane {
    if let Some(origin) = settings.projection_origin {
        return LocalTangentPlane::from_origin(origin);
    }
    LocalTangentPlane::centered_on(references)
        .or_else(|| {
            traces
                .first()
                .map(|point| LocalTangentPlane::new(point.lat, point.long))
        })
        .unwrap_or_else(|| LocalTangentPlane::new(0.0, 0.0))
}

struct Stage<'a> {
    name: &'static str,
    progress: Option<&'a dyn ProgressHandler>,
}

impl<'a> Stage<'a> {
    fn start(name: &'static str, progress: Option<&'a dyn ProgressHandler>) -> Self {
        if let Some(progress) = progress {
            progress.on_start_stage(name);
        }
        Self { name, progress }
    }
}

impl Drop for Stage<'_> {
    fn drop(&mut self) {
        if let Some(progress) = self.progress {
            progress.on_finish_stage(self.name);
        }
    }
}

/// Runs matching, cleanup, summaries and segment trajectories in order.
pub fn run_pipeline(
    dataset: &RawnavDataset,
    settings: &MatchSettings,
    progress: Option<&dyn ProgressHandler>,
) -> Result<PipelineOutcome, MatchError> {
    let mut notices = NoticeContainer::new();
    let mut counts = StageCounts {
        trace_rows: dataset.traces.len(),
        reference_points: dataset.references.len(),
        ..StageCounts::default()
    };

    let (traces, references) = {
        let _stage = Stage::start("Checking input rows", progress);
        let traces = drop_non_finite_traces(dataset.traces.clone(), &mut notices);
        let traces = drop_duplicate_trace_indices(traces, &mut notices);
        let references = drop_non_finite_references(dataset.references.clone(), &mut notices);
        (traces, references)
    };
    counts.trace_rows_unique = traces.len();
    counts.reference_points_valid = references.len();
    let plane = projection_plane(&references, &traces, settings);

    let matches = {
        let _stage = Stage::start("Matching stops", progress);
        match_trips(&references, &traces, &plane, &mut notices, progress)
    };
    counts.matches = matches.len();

    let filtered = {
        let _stage = Stage::start("Dropping distant matches", progress);
        let outcome = drop_far_matches(matches, settings.max_stop_distance_ft);
        notices.extend(outcome.notices(settings.max_stop_distance_ft));
        outcome.matches
    };
    counts.matches_within_distance = filtered.len();

    let repaired = {
        let _stage = Stage::start("Repairing stop order", progress);
        let outcome = repair_monotonic_order(filtered)?;
        notices.extend(outcome.violations.iter().map(|violation| violation.to_notice()));
        outcome.matches
    };
    counts.matches_in_order = repaired.len();

    let summaries = {
        let _stage = Stage::start("Summarizing trips", progress);
        build_trip_summaries(&repaired, &traces, &references, &mut notices)
    };
    counts.summaries = summaries.len();

    let trips = group_trip_traces(&traces);
    counts.trips = trips.len();

    let trajectories = if dataset.segments.is_empty() {
        Vec::new()
    } else {
        let _stage = Stage::start("Building segment trajectories", progress);
        build_segment_trajectories(
            &dataset.segments,
            &trips,
            &plane,
            settings.max_segment_distance_ft,
            &mut notices,
        )
    };
    counts.segment_points = trajectories.len();

    info!(
        "run complete: {} matches kept, {} trips summarized, {} notices",
        repaired.len(),
        summaries.len(),
        notices.len()
    );
    Ok(PipelineOutcome {
        matches: repaired,
        summaries,
        trajectories,
        notices,
        stage_counts: counts,
    })
}
