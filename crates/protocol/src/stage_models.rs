//! Pipeline stages and persisted state records.
//!
//! The state data here is what gets written to
//! `<work_dir>/.pipeline/pipeline_state.json` after every mutation, so all
//! field names are part of the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One named unit of pipeline work.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResourceFinder,
    HumanReview,
    ExperimentRunner,
    PaperWriter,
}

impl Stage {
    /// The snake_case name used as the state-map key and in log file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResourceFinder => "resource_finder",
            Stage::HumanReview => "human_review",
            Stage::ExperimentRunner => "experiment_runner",
            Stage::PaperWriter => "paper_writer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded status of a stage.
///
/// A stage only reaches `Completed` or `Failed` through an explicit
/// completion call; there is no implicit transition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    InProgress,
    Completed,
    Failed,
}

/// Persisted record for a single stage.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StageRecord {
    pub status: StageStatus,

    /// Absent when the stage was completed without ever being started
    /// (the deliberate-skip path).
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Recorded outcome; `None` while the stage is still in progress.
    #[serde(default)]
    pub success: Option<bool>,

    /// Free-form stage outputs (paths found, skip markers, ...).
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
}

impl StageRecord {
    /// A fresh in-progress record with a start timestamp.
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            status: StageStatus::InProgress,
            started_at: Some(now),
            completed_at: None,
            success: None,
            outputs: serde_json::Map::new(),
        }
    }
}

/// The whole persisted pipeline state for one working directory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PipelineStateData {
    pub created_at: DateTime<Utc>,

    /// Stage name -> record. BTreeMap keeps the serialized file stable.
    #[serde(default)]
    pub stages: BTreeMap<String, StageRecord>,

    /// The single stage currently in progress, if any.
    #[serde(default)]
    pub current_stage: Option<String>,

    /// Whole-pipeline flag; only set after the experiment stage succeeds.
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineStateData {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            stages: BTreeMap::new(),
            current_stage: None,
            completed: false,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ResourceFinder.as_str(), "resource_finder");
        assert_eq!(Stage::ExperimentRunner.to_string(), "experiment_runner");
    }

    #[test]
    fn test_state_data_json_roundtrip() {
        let mut data = PipelineStateData::new(Utc::now());
        let mut record = StageRecord::started(Utc::now());
        record.status = StageStatus::Completed;
        record.success = Some(true);
        data.stages
            .insert(Stage::ResourceFinder.as_str().to_string(), record);
        data.current_stage = None;

        let json = serde_json::to_string_pretty(&data).unwrap();
        assert!(json.contains("\"resource_finder\""));
        assert!(json.contains("\"completed\""));

        let back: PipelineStateData = serde_json::from_str(&json).unwrap();
        let record = &back.stages["resource_finder"];
        assert_eq!(record.status, StageStatus::Completed);
        assert_eq!(record.success, Some(true));
        assert!(!back.completed);
    }

    #[test]
    fn test_state_data_tolerates_missing_fields() {
        let back: PipelineStateData =
            serde_json::from_str(r#"{"created_at": "2026-01-05T10:00:00Z"}"#).unwrap();
        assert!(back.stages.is_empty());
        assert!(back.current_stage.is_none());
        assert!(!back.completed);
    }
}
