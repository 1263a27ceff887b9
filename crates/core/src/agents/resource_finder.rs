//! Resource-finder stage: literature review, dataset and code gathering.
//!
//! The agent signals completion by creating a marker file in the workspace
//! root; that marker, not the exit code alone, decides stage success. The
//! expected output files are scanned afterwards and folded into the stage
//! outputs.

use crate::agents::exec::{run_agent, ExecError, ExecRequest};
use crate::agents::stage_report_from_exec;
use crate::prompts::build_resource_finder_prompt;
use rk_protocol::idea_models::IdeaSpec;
use rk_protocol::provider_models::ProviderCommand;
use rk_protocol::run_models::StageReport;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Marker file the agent creates once every gathering task is done.
pub const COMPLETION_MARKER: &str = ".resource_finder_complete";

/// Output files and directories the stage is expected to produce.
const EXPECTED_OUTPUTS: &[(&str, &str)] = &[
    ("literature_review", "literature_review.md"),
    ("resources_catalog", "resources.md"),
    ("papers_dir", "papers"),
    ("datasets_dir", "datasets"),
    ("code_dir", "code"),
];

/// Launch the resource-finder agent and wait for it.
pub async fn run_resource_finder(
    idea: &IdeaSpec,
    work_dir: &Path,
    command: &ProviderCommand,
    timeout: Duration,
    full_permissions: bool,
) -> Result<StageReport, ExecError> {
    let provider = command.provider;
    println!("🔍 Starting resource finder agent");
    println!("   Provider: {provider}");
    println!("   Work dir: {}", work_dir.display());
    println!("   Timeout: {}s ({} minutes)", timeout.as_secs(), timeout.as_secs() / 60);

    let prompt = build_resource_finder_prompt(idea);
    let logs_dir = work_dir.join("logs");
    save_artifact(&logs_dir.join("resource_finder_prompt.txt"), &prompt);

    let log_file = logs_dir.join(format!("resource_finder_{provider}.log"));
    let transcript_file = logs_dir.join(format!("resource_finder_{provider}_transcript.jsonl"));

    println!("▶️  Launching {provider} CLI agent ({} chars of prompt)", prompt.len());
    println!("   Log file: {}", log_file.display());

    let report = run_agent(
        ExecRequest::new(
            command.argv(full_permissions),
            prompt,
            work_dir,
            timeout,
            log_file,
        )
        .with_transcript(transcript_file)
        .with_env(command.env.clone())
        .with_echo(true),
    )
    .await?;

    let marker = work_dir.join(COMPLETION_MARKER);
    let marker_found = marker.exists();
    // The marker is the real completion signal; exit code zero without it
    // means the agent stopped before finishing its tasks.
    let success = !report.timed_out && report.error.is_none() && marker_found;

    match report.exit_code {
        Some(0) => println!("✅ Agent execution completed"),
        Some(code) => println!("⚠️  Agent exited with return code {code}"),
        None => {}
    }
    if marker_found {
        println!("✅ Completion marker found: {}", marker.display());
    } else {
        println!("⚠️  Completion marker NOT found: {}", marker.display());
    }

    let mut stage = stage_report_from_exec(&report);
    stage.success = success;
    stage.outputs = scan_outputs(work_dir);
    if marker_found {
        stage.outputs.insert(
            "completion_marker".to_string(),
            Value::String(marker.display().to_string()),
        );
    }
    Ok(stage)
}

/// Record which of the expected output files actually exist.
fn scan_outputs(work_dir: &Path) -> Map<String, Value> {
    let mut outputs = Map::new();
    for (name, relative) in EXPECTED_OUTPUTS {
        let path = work_dir.join(relative);
        if path.exists() {
            outputs.insert(
                (*name).to_string(),
                Value::String(path.display().to_string()),
            );
        }
    }
    outputs
}

fn save_artifact(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(err) = std::fs::write(path, content) {
        warn!(path = %path.display(), error = %err, "could not save prompt artifact");
    }
}
