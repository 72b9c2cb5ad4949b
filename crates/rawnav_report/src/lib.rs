use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, SecondsFormat};
use serde::Serialize;

use rawnav_core::{
    MatchSettings, Notice, NoticeContainer, NoticeSeverity, PipelineOutcome, StageCounts,
};

pub mod html;
pub mod tables;

pub use html::write_html_report;
pub use tables::{write_matches_csv, write_summaries_csv, write_trajectories_csv};

pub const MATCHES_FILE: &str = "matches.csv";
pub const SUMMARIES_FILE: &str = "summaries.csv";
pub const TRAJECTORIES_FILE: &str = "segment_trajectories.csv";
pub const REPORT_JSON_FILE: &str = "report.json";
pub const REPORT_HTML_FILE: &str = "report.html";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInputs {
    pub trace: PathBuf,
    pub reference: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_boundaries: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeCount {
    pub code: String,
    pub severity: NoticeSeverity,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub inputs: ReportInputs,
    pub settings: MatchSettings,
    pub counts: StageCounts,
    pub notice_counts: Vec<NoticeCount>,
    pub notices: Vec<Notice>,
}

impl RunReport {
    pub fn new(
        inputs: ReportInputs,
        settings: &MatchSettings,
        counts: &StageCounts,
        notices: &NoticeContainer,
    ) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            version: None,
            inputs,
            settings: settings.clone(),
            counts: counts.clone(),
            notice_counts: count_notices(notices),
            notices: notices.iter().cloned().collect(),
        }
    }

    pub fn from_outcome(
        inputs: ReportInputs,
        settings: &MatchSettings,
        outcome: &PipelineOutcome,
    ) -> Self {
        Self::new(inputs, settings, &outcome.stage_counts, &outcome.notices)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P, pretty: bool) -> anyhow::Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
        .context("serialize run report")?;
        fs::write(&path, json)
            .with_context(|| format!("write run report to {}", path.as_ref().display()))?;
        Ok(())
    }
}

/// Totals per notice code, most severe first, then by code.
pub fn count_notices(notices: &NoticeContainer) -> Vec<NoticeCount> {
    let mut totals: BTreeMap<(NoticeSeverity, &str), usize> = BTreeMap::new();
    for notice in notices.iter() {
        *totals
            .entry((notice.severity, notice.code.as_str()))
            .or_insert(0) += 1;
    }
    totals
        .into_iter()
        .map(|((severity, code), total)| NoticeCount {
            code: code.to_string(),
            severity,
            total,
        })
        .collect()
}

/// Writes every table and report for one run into `dir`.
pub fn write_outputs(
    dir: &Path,
    outcome: &PipelineOutcome,
    report: &RunReport,
    pretty: bool,
) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))?;
    write_matches_csv(dir.join(MATCHES_FILE), &outcome.matches)?;
    write_summaries_csv(dir.join(SUMMARIES_FILE), &outcome.summaries)?;
    if report.inputs.segment_boundaries.is_some() {
        write_trajectories_csv(dir.join(TRAJECTORIES_FILE), &outcome.trajectories)?;
    }
    report.write_json(dir.join(REPORT_JSON_FILE), pretty)?;
    write_html_report(dir.join(REPORT_HTML_FILE), report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawnav_model::TripKey;

    fn inputs() -> ReportInputs {
        ReportInputs {
            trace: PathBuf::from("trace.csv"),
            reference: PathBuf::from("stops.csv"),
            segment_boundaries: None,
        }
    }

    #[test]
    fn counts_notices_by_severity_then_code() {
        let trip = TripKey::new("rawnav06435191012.txt", 944);
        let mut notices = NoticeContainer::new();
        notices.push(Notice::trip_without_trace(&trip));
        notices.push(Notice::insufficient_matches(&trip, 1));
        notices.push(Notice::insufficient_matches(&trip, 0));
        notices.push(Notice::segment_too_far(&trip, "piney_branch", 90.0, 70.0));

        let counts = count_notices(&notices);
        let summary: Vec<(&str, usize)> = counts
            .iter()
            .map(|count| (count.code.as_str(), count.total))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("insufficient_matches_for_trip", 2),
                ("trip_without_bounded_trace", 1),
                ("segment_boundary_too_far", 1),
            ]
        );
    }

    #[test]
    fn serializes_report_in_camel_case() {
        let report = RunReport::new(
            inputs(),
            &MatchSettings::default(),
            &StageCounts::default(),
            &NoticeContainer::new(),
        )
        .with_version("0.1.0");
        let value = serde_json::to_value(&report).expect("json");

        assert!(value.get("generatedAt").is_some());
        assert_eq!(value["version"], "0.1.0");
        assert_eq!(value["settings"]["max_stop_distance_ft"], 100.0);
        assert!(value["inputs"].get("segmentBoundaries").is_none());
    }
}
