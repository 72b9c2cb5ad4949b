use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::InputError;

pub const DEFAULT_MAX_STOP_DISTANCE_FT: f64 = 100.0;
pub const DEFAULT_MAX_SEGMENT_DISTANCE_FT: f64 = 70.0;

/// Origin of the local plane used for distance computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOrigin {
    pub lat: f64,
    pub lon: f64,
}

/// Thresholds and projection settings for one matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Matches at or beyond this distance are dropped.
    pub max_stop_distance_ft: f64,
    /// Trips whose nearest point to either segment boundary is at or beyond
    /// this distance are left out of segment trajectories.
    pub max_segment_distance_ft: f64,
    /// Defaults to the mean position of the reference points.
    pub projection_origin: Option<ProjectionOrigin>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_stop_distance_ft: DEFAULT_MAX_STOP_DISTANCE_FT,
            max_segment_distance_ft: DEFAULT_MAX_SEGMENT_DISTANCE_FT,
            projection_origin: None,
        }
    }
}

impl MatchSettings {
    pub fn from_json_file(path: &Path) -> Result<Self, InputError> {
        if !path.exists() {
            return Err(InputError::MissingFile(path.to_path_buf()));
        }
        let data = fs::read(path).map_err(|source| InputError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| InputError::Settings {
            file: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: MatchSettings =
            serde_json::from_str(r#"{"max_stop_distance_ft": 150.0}"#).expect("parse");
        assert_eq!(settings.max_stop_distance_ft, 150.0);
        assert_eq!(
            settings.max_segment_distance_ft,
            DEFAULT_MAX_SEGMENT_DISTANCE_FT
        );
        assert!(settings.projection_origin.is_none());
    }

    #[test]
    fn reports_missing_settings_file() {
        let path = std::env::temp_dir().join("rawnav_settings_does_not_exist.json");
        let err = MatchSettings::from_json_file(&path).unwrap_err();
        assert!(matches!(err, InputError::MissingFile(_)));
    }
}
