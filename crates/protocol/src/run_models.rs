//! Transient result values returned by stage runners and the orchestrator.
//!
//! These are not persisted directly: stage reports are folded into the
//! pipeline state and into the top-level [`PipelineReport`] handed back to
//! the caller (and serialized once into `pipeline_results.json`).

use crate::stage_models::Stage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of a single stage runner invocation.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StageReport {
    pub success: bool,

    /// True when the stage was deliberately skipped and no process ran.
    #[serde(default)]
    pub skipped: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,

    #[serde(default)]
    pub timed_out: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl StageReport {
    /// Report for a deliberately skipped stage: a success, not a failure.
    pub fn skipped() -> Self {
        let mut outputs = Map::new();
        outputs.insert("skipped".to_string(), Value::Bool(true));
        Self {
            success: true,
            skipped: true,
            outputs,
            ..Default::default()
        }
    }

    /// Report for a stage that failed before any process outcome existed.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Top-level result of one pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PipelineReport {
    pub success: bool,

    /// Stage name -> report, for every stage that was entered.
    #[serde(default)]
    pub stages: BTreeMap<String, StageReport>,

    pub work_dir: PathBuf,

    /// Set by `resume_pipeline`: `Some(false)` means nothing was re-run
    /// because the pipeline was already complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            success: false,
            stages: BTreeMap::new(),
            work_dir,
            resumed: None,
            message: None,
            error: None,
        }
    }

    /// Report recorded for a stage, if it was entered.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.get(stage.as_str())
    }

    pub fn insert_stage(&mut self, stage: Stage, report: StageReport) {
        self.stages.insert(stage.as_str().to_string(), report);
    }
}

/// What the research runner returns to the CLI after finalization.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub work_dir: PathBuf,
    pub repo_url: Option<String>,
    pub success: bool,
}
