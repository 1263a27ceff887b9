//! File-backed store for research ideas.
//!
//! Ideas live as one YAML document per file under a status directory:
//! `ideas/{submitted,in_progress,completed}/<idea_id>.yaml`. A status
//! update rewrites the document with fresh metadata and moves the file to
//! the directory matching the new status.

use chrono::Utc;
use rk_protocol::idea_models::{
    IdeaDocument, IdeaStatus, IdeaSummary, ValidationReport,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

/// Domains accepted by idea validation.
pub const VALID_DOMAINS: &[&str] = &[
    "machine_learning",
    "data_science",
    "systems",
    "theory",
    "scientific_computing",
    "nlp",
    "computer_vision",
    "reinforcement_learning",
];

/// Compute classes accepted in idea constraints.
const VALID_COMPUTE: &[&str] = &["cpu_only", "gpu_required", "multi_gpu", "tpu", "any"];

/// Errors raised by the idea store.
#[derive(Error, Debug)]
pub enum IdeaError {
    #[error("idea store I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed idea file at {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("idea validation failed:\n{}", errors.join("\n"))]
    Validation { errors: Vec<String> },
}

/// Manages research idea submissions and tracking.
pub struct IdeaStore {
    ideas_dir: PathBuf,
}

impl IdeaStore {
    /// Open (and create if necessary) the store rooted at `ideas_dir`.
    pub fn new(ideas_dir: impl Into<PathBuf>) -> Result<Self, IdeaError> {
        let ideas_dir = ideas_dir.into();
        for status in IdeaStatus::ALL {
            let dir = ideas_dir.join(status.as_str());
            std::fs::create_dir_all(&dir).map_err(|source| IdeaError::Io { path: dir, source })?;
        }
        Ok(Self { ideas_dir })
    }

    pub fn ideas_dir(&self) -> &Path {
        &self.ideas_dir
    }

    fn status_dir(&self, status: IdeaStatus) -> PathBuf {
        self.ideas_dir.join(status.as_str())
    }

    /// Validate an idea document against the schema rules.
    pub fn validate(doc: &IdeaDocument) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let idea = &doc.idea;

        if idea.title.as_deref().unwrap_or("").is_empty() {
            errors.push("Missing required field: title".to_string());
        }
        if idea.hypothesis.as_deref().unwrap_or("").is_empty() {
            errors.push("Missing required field: hypothesis".to_string());
        } else if idea.hypothesis.as_deref().unwrap_or("").len() < 20 {
            warnings.push(
                "Hypothesis is very short (< 20 characters). Consider providing more detail."
                    .to_string(),
            );
        }

        match idea.domain.as_deref() {
            None | Some("") => errors.push("Missing required field: domain".to_string()),
            Some(domain) if !VALID_DOMAINS.contains(&domain) => errors.push(format!(
                "Invalid domain: {domain}. Must be one of: {}",
                VALID_DOMAINS.join(", ")
            )),
            Some(_) => {}
        }

        if idea.expected_outputs.is_empty() {
            errors.push("At least one expected output is required".to_string());
        } else {
            for (idx, output) in idea.expected_outputs.iter().enumerate() {
                if output.kind.as_deref().unwrap_or("").is_empty() {
                    errors.push(format!("Output {idx}: missing 'type' field"));
                }
                if output.format.as_deref().unwrap_or("").is_empty() {
                    errors.push(format!("Output {idx}: missing 'format' field"));
                }
            }
        }

        if let Some(constraints) = &idea.constraints {
            if let Some(compute) = constraints.compute.as_deref() {
                if !VALID_COMPUTE.contains(&compute) {
                    errors.push(format!("Invalid compute constraint: {compute}"));
                }
            }
            if let Some(time_limit) = constraints.time_limit {
                if time_limit < 60 {
                    warnings.push("time_limit is very short (< 60 seconds)".to_string());
                } else if time_limit > 86_400 {
                    warnings.push("time_limit is very long (> 24 hours)".to_string());
                }
            }
        }

        if idea.evaluation_criteria.is_empty() {
            warnings.push("No evaluation criteria specified".to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Submit a new idea: validate, assign an id, stamp metadata, store.
    pub fn submit(&self, mut doc: IdeaDocument, validate: bool) -> Result<String, IdeaError> {
        if validate {
            let report = Self::validate(&doc);
            if !report.valid {
                return Err(IdeaError::Validation {
                    errors: report.errors,
                });
            }
        }

        let idea_id = generate_idea_id(doc.idea.title_or_default());
        let metadata = doc.idea.metadata.get_or_insert_with(Default::default);
        metadata.idea_id = Some(idea_id.clone());
        metadata.created_at = Some(Utc::now());
        metadata.status = Some(IdeaStatus::Submitted);

        let path = self.status_dir(IdeaStatus::Submitted).join(format!("{idea_id}.yaml"));
        write_idea(&path, &doc)?;
        debug!(idea_id = %idea_id, path = %path.display(), "idea submitted");

        Ok(idea_id)
    }

    /// Locate the file holding an idea, searching all status directories.
    pub fn path_of(&self, idea_id: &str) -> Option<PathBuf> {
        IdeaStatus::ALL.iter().find_map(|status| {
            let candidate = self.status_dir(*status).join(format!("{idea_id}.yaml"));
            candidate.exists().then_some(candidate)
        })
    }

    /// Retrieve an idea by id, or `None` when it does not exist.
    pub fn get(&self, idea_id: &str) -> Result<Option<IdeaDocument>, IdeaError> {
        match self.path_of(idea_id) {
            Some(path) => read_idea(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Persist an updated document in place (metadata refreshes).
    ///
    /// Returns false when the idea is unknown.
    pub fn save(&self, idea_id: &str, doc: &IdeaDocument) -> Result<bool, IdeaError> {
        match self.path_of(idea_id) {
            Some(path) => {
                write_idea(&path, doc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Update an idea's status and move it to the matching directory.
    ///
    /// Returns false when the idea is unknown.
    pub fn update_status(&self, idea_id: &str, new_status: IdeaStatus) -> Result<bool, IdeaError> {
        let Some(current_path) = self.path_of(idea_id) else {
            return Ok(false);
        };

        let mut doc = read_idea(&current_path)?;
        let metadata = doc.idea.metadata.get_or_insert_with(Default::default);
        metadata.status = Some(new_status);
        metadata.updated_at = Some(Utc::now());

        let new_path = self.status_dir(new_status).join(format!("{idea_id}.yaml"));
        write_idea(&new_path, &doc)?;
        if new_path != current_path {
            std::fs::remove_file(&current_path).map_err(|source| IdeaError::Io {
                path: current_path,
                source,
            })?;
        }
        debug!(idea_id, status = %new_status, "idea status updated");

        Ok(true)
    }

    /// List idea summaries, optionally filtered by status, most recent first.
    pub fn list(&self, status: Option<IdeaStatus>) -> Result<Vec<IdeaSummary>, IdeaError> {
        let statuses: Vec<IdeaStatus> = match status {
            Some(one) => vec![one],
            None => IdeaStatus::ALL.to_vec(),
        };

        let mut summaries = Vec::new();
        for status in statuses {
            let dir = self.status_dir(status);
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).into_iter().flatten() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                    continue;
                }
                let doc = read_idea(path)?;
                let metadata = doc.idea.metadata.clone().unwrap_or_default();
                summaries.push(IdeaSummary {
                    idea_id: metadata
                        .idea_id
                        .unwrap_or_else(|| {
                            path.file_stem()
                                .and_then(|stem| stem.to_str())
                                .unwrap_or("unknown")
                                .to_string()
                        }),
                    title: doc.idea.title_or_default().to_string(),
                    domain: doc.idea.domain_or_default().to_string(),
                    status: metadata.status.or(Some(status)),
                    created_at: metadata.created_at,
                    path: path.to_path_buf(),
                });
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

fn read_idea(path: &Path) -> Result<IdeaDocument, IdeaError> {
    let content = std::fs::read_to_string(path).map_err(|source| IdeaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| IdeaError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn write_idea(path: &Path, doc: &IdeaDocument) -> Result<(), IdeaError> {
    let yaml = serde_yaml::to_string(doc).map_err(|source| IdeaError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, yaml).map_err(|source| IdeaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a unique id from the title slug, a timestamp and a short random
/// suffix: `probing_transfer_limits_20260805_142501_a1b2c3d4`.
fn generate_idea_id(title: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{timestamp}_{}", slugify(title, 30), &suffix[..8])
}

/// Lowercase, alphanumeric-only slug capped at `max_len` characters.
fn slugify(text: &str, max_len: usize) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let capped: String = slug.chars().take(max_len).collect();
    capped.trim_end_matches('_').to_string()
}
