//! Persisted pipeline state for one working directory.
//!
//! The state lives at `<work_dir>/.pipeline/pipeline_state.json` and is
//! fully rewritten on every mutation, which makes runs crash-safe at stage
//! granularity. There is no file locking: one orchestrator instance per
//! working directory is a deployment assumption, and concurrent writers
//! would corrupt the state via last-write-wins.

use chrono::Utc;
use rk_protocol::stage_models::{PipelineStateData, Stage, StageRecord, StageStatus};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory under the working directory holding pipeline bookkeeping.
pub const STATE_DIR: &str = ".pipeline";

/// State file name inside [`STATE_DIR`].
pub const STATE_FILE: &str = "pipeline_state.json";

/// Results file name inside [`STATE_DIR`].
pub const RESULTS_FILE: &str = "pipeline_results.json";

/// Errors raised by state persistence.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to read pipeline state at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write pipeline state at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed pipeline state at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Exclusive owner of the persisted state for one working directory.
#[derive(Debug)]
pub struct PipelineState {
    state_file: PathBuf,
    data: PipelineStateData,
}

impl PipelineState {
    /// Load the state for `work_dir`, or create an empty one (persisted
    /// immediately) when none exists yet.
    pub fn open(work_dir: &Path) -> Result<Self, StateError> {
        let state_dir = work_dir.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir).map_err(|source| StateError::Write {
            path: state_dir.clone(),
            source,
        })?;
        let state_file = state_dir.join(STATE_FILE);

        if state_file.exists() {
            let content =
                std::fs::read_to_string(&state_file).map_err(|source| StateError::Read {
                    path: state_file.clone(),
                    source,
                })?;
            let data = serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: state_file.clone(),
                source,
            })?;
            debug!(path = %state_file.display(), "resumed pipeline state");
            Ok(Self { state_file, data })
        } else {
            let state = Self {
                state_file,
                data: PipelineStateData::new(Utc::now()),
            };
            state.save()?;
            Ok(state)
        }
    }

    pub fn data(&self) -> &PipelineStateData {
        &self.data
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    /// Mark a stage as started: it becomes the current stage with a fresh
    /// in-progress record, clearing any previous completion fields.
    pub fn start_stage(&mut self, stage: Stage) -> Result<(), StateError> {
        self.data.current_stage = Some(stage.as_str().to_string());
        self.data
            .stages
            .insert(stage.as_str().to_string(), StageRecord::started(Utc::now()));
        self.save()
    }

    /// Mark a stage as completed or failed.
    ///
    /// Completing a stage that was never started is allowed and creates the
    /// record; this is how deliberately skipped stages are recorded as
    /// trivially successful.
    pub fn complete_stage(
        &mut self,
        stage: Stage,
        success: bool,
        outputs: Option<Map<String, Value>>,
    ) -> Result<(), StateError> {
        let record = self
            .data
            .stages
            .entry(stage.as_str().to_string())
            .or_insert_with(|| StageRecord {
                status: StageStatus::InProgress,
                started_at: None,
                completed_at: None,
                success: None,
                outputs: Map::new(),
            });
        record.status = if success {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };
        record.completed_at = Some(Utc::now());
        record.success = Some(success);
        if let Some(outputs) = outputs {
            record.outputs = outputs;
        }
        self.data.current_stage = None;
        self.save()
    }

    /// Mark the whole pipeline as completed.
    pub fn mark_completed(&mut self) -> Result<(), StateError> {
        self.data.completed = true;
        self.data.completed_at = Some(Utc::now());
        self.save()
    }

    /// True iff the stage completed with an explicitly recorded success.
    /// A failed record and a missing record both yield false.
    pub fn is_stage_completed(&self, stage: Stage) -> bool {
        self.data
            .stages
            .get(stage.as_str())
            .is_some_and(|record| {
                record.status == StageStatus::Completed && record.success == Some(true)
            })
    }

    /// Recorded status of a stage, if any.
    pub fn stage_status(&self, stage: Stage) -> Option<StageStatus> {
        self.data.stages.get(stage.as_str()).map(|record| record.status)
    }

    /// Full rewrite of the state file.
    fn save(&self) -> Result<(), StateError> {
        let json =
            serde_json::to_string_pretty(&self.data).map_err(|source| StateError::Parse {
                path: self.state_file.clone(),
                source,
            })?;
        std::fs::write(&self.state_file, json).map_err(|source| StateError::Write {
            path: self.state_file.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_state_file() {
        let dir = tempdir().unwrap();
        let state = PipelineState::open(dir.path()).unwrap();
        assert!(state.path().exists());
        assert!(state.data().stages.is_empty());
        assert!(!state.data().completed);
    }

    #[test]
    fn test_start_and_complete_stage() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::open(dir.path()).unwrap();

        state.start_stage(Stage::ResourceFinder).unwrap();
        assert_eq!(
            state.data().current_stage.as_deref(),
            Some("resource_finder")
        );
        assert_eq!(
            state.stage_status(Stage::ResourceFinder),
            Some(StageStatus::InProgress)
        );
        assert!(!state.is_stage_completed(Stage::ResourceFinder));

        state
            .complete_stage(Stage::ResourceFinder, true, None)
            .unwrap();
        assert!(state.data().current_stage.is_none());
        assert!(state.is_stage_completed(Stage::ResourceFinder));
    }

    #[test]
    fn test_failed_stage_is_not_completed() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::open(dir.path()).unwrap();
        state.start_stage(Stage::ExperimentRunner).unwrap();
        state
            .complete_stage(Stage::ExperimentRunner, false, None)
            .unwrap();
        assert_eq!(
            state.stage_status(Stage::ExperimentRunner),
            Some(StageStatus::Failed)
        );
        assert!(!state.is_stage_completed(Stage::ExperimentRunner));
    }

    #[test]
    fn test_missing_stage_is_not_completed() {
        let dir = tempdir().unwrap();
        let state = PipelineState::open(dir.path()).unwrap();
        assert!(!state.is_stage_completed(Stage::PaperWriter));
        assert!(state.stage_status(Stage::PaperWriter).is_none());
    }

    #[test]
    fn test_complete_unstarted_stage_creates_record() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::open(dir.path()).unwrap();
        let mut outputs = Map::new();
        outputs.insert("skipped".to_string(), Value::Bool(true));
        state
            .complete_stage(Stage::ResourceFinder, true, Some(outputs))
            .unwrap();

        assert!(state.is_stage_completed(Stage::ResourceFinder));
        let record = &state.data().stages["resource_finder"];
        assert!(record.started_at.is_none());
        assert_eq!(record.outputs["skipped"], Value::Bool(true));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut state = PipelineState::open(dir.path()).unwrap();
            state.start_stage(Stage::ResourceFinder).unwrap();
            state
                .complete_stage(Stage::ResourceFinder, true, None)
                .unwrap();
            state.start_stage(Stage::ExperimentRunner).unwrap();
        }

        let reopened = PipelineState::open(dir.path()).unwrap();
        assert!(reopened.is_stage_completed(Stage::ResourceFinder));
        assert_eq!(
            reopened.stage_status(Stage::ExperimentRunner),
            Some(StageStatus::InProgress)
        );
        assert_eq!(
            reopened.data().current_stage.as_deref(),
            Some("experiment_runner")
        );
    }

    #[test]
    fn test_mark_completed_sets_flag_and_timestamp() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::open(dir.path()).unwrap();
        state.mark_completed().unwrap();

        let reopened = PipelineState::open(dir.path()).unwrap();
        assert!(reopened.data().completed);
        assert!(reopened.data().completed_at.is_some());
    }

    #[test]
    fn test_restart_stage_clears_completion_fields() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::open(dir.path()).unwrap();
        state.start_stage(Stage::ResourceFinder).unwrap();
        state
            .complete_stage(Stage::ResourceFinder, false, None)
            .unwrap();

        state.start_stage(Stage::ResourceFinder).unwrap();
        let record = &state.data().stages["resource_finder"];
        assert_eq!(record.status, StageStatus::InProgress);
        assert!(record.success.is_none());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_malformed_state_is_reported() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(STATE_DIR);
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join(STATE_FILE), "{not json").unwrap();

        match PipelineState::open(dir.path()) {
            Err(StateError::Parse { path, .. }) => assert!(path.ends_with(STATE_FILE)),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}
