//! Idea document models for `ideas/**/*.yaml`.
//!
//! A research idea is submitted as a YAML document with a single top-level
//! `idea` mapping. All fields except the required trio checked by validation
//! (title, domain, hypothesis) are optional so that partially filled
//! documents can still be loaded and reported on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle status of a research idea.
///
/// Ideas move through these states as the runner picks them up:
/// submitted -> in_progress -> completed. The status doubles as the name of
/// the storage directory holding the idea file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    /// Idea has been validated and stored, waiting for a run.
    Submitted,

    /// A pipeline run against this idea is underway.
    InProgress,

    /// The pipeline finished (successfully or not) and results were published.
    Completed,
}

impl IdeaStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [IdeaStatus; 3] = [
        IdeaStatus::Submitted,
        IdeaStatus::InProgress,
        IdeaStatus::Completed,
    ];

    /// The snake_case name used in files and directories.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaStatus::Submitted => "submitted",
            IdeaStatus::InProgress => "in_progress",
            IdeaStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(IdeaStatus::Submitted),
            "in_progress" => Ok(IdeaStatus::InProgress),
            "completed" => Ok(IdeaStatus::Completed),
            other => Err(format!(
                "invalid idea status: {other} (expected submitted, in_progress or completed)"
            )),
        }
    }
}

/// A paper reference in the idea background.
///
/// Accepts either a bare string or a `{title, url}` mapping in YAML.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum PaperRef {
    /// Structured reference with an optional link.
    Titled {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// Free-form one-line reference.
    Plain(String),
}

/// A dataset reference in the idea background.
///
/// Accepts either a bare string or a `{name, source}` mapping in YAML.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum DatasetRef {
    /// Structured reference with an optional origin.
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Free-form one-line reference.
    Plain(String),
}

/// Background material supplied with an idea.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Background {
    /// Free-form context paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Papers the submitter already knows about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub papers: Vec<PaperRef>,

    /// Datasets the submitter already knows about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<DatasetRef>,

    /// Related work notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_work: Option<String>,
}

impl Background {
    /// True when no field carries any content.
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
            && self.papers.is_empty()
            && self.datasets.is_empty()
            && self.related_work.is_none()
    }
}

/// Constraints and requirements attached to an idea.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Constraints {
    /// Human-readable computational constraints, surfaced in prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computational: Option<String>,

    /// Human-readable time constraints, surfaced in prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Budget constraints, surfaced in prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,

    /// Anything else the agents should honor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,

    /// Machine-checked compute class (cpu_only, gpu_required, multi_gpu, tpu, any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,

    /// Machine-checked wall-clock budget in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,
}

impl Constraints {
    /// True when no prompt-visible field carries any content.
    pub fn is_empty(&self) -> bool {
        self.computational.is_none()
            && self.time.is_none()
            && self.budget.is_none()
            && self.other.is_none()
    }
}

/// One expected output artifact of the research run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ExpectedOutput {
    /// Artifact kind (metrics, figure, model, report, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// File format (json, csv, png, md, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Named fields expected inside the artifact.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

/// Metadata stamped onto an idea by the store and the runner.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IdeaMetadata {
    /// Generated unique identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_id: Option<String>,

    /// Submission timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last status-change timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Current lifecycle status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IdeaStatus>,

    /// Name of the hosting repository holding the workspace, once created.
    #[serde(
        rename = "github_repo_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub repo_name: Option<String>,

    /// Browser URL of the hosting repository, once created.
    #[serde(
        rename = "github_repo_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub repo_url: Option<String>,
}

/// The idea specification itself.
///
/// The pipeline treats this as read-only input; only `metadata` is ever
/// written back, and only by the idea store and the workspace setup.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IdeaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_outputs: Vec<ExpectedOutput>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluation_criteria: Vec<String>,

    /// Operator feedback for follow-up work on an existing workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<IdeaMetadata>,
}

impl IdeaSpec {
    /// Title with the source's fallback for untitled ideas.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled Research")
    }

    /// Domain with a neutral fallback.
    pub fn domain_or_default(&self) -> &str {
        self.domain.as_deref().unwrap_or("general")
    }
}

/// Top-level idea document as stored on disk.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IdeaDocument {
    pub idea: IdeaSpec,
}

/// Outcome of validating an idea document against the schema rules.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// One line of `list` output: enough to identify an idea without loading it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IdeaSummary {
    pub idea_id: String,
    pub title: String,
    pub domain: String,
    pub status: Option<IdeaStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}
