//! Experiment-runner stage: implementation, execution and analysis.

use crate::agents::exec::{run_agent, ExecError, ExecRequest};
use crate::agents::stage_report_from_exec;
use crate::prompts::{build_experiment_prompt, build_session_instructions, SessionMode};
use rk_protocol::idea_models::IdeaSpec;
use rk_protocol::provider_models::ProviderCommand;
use rk_protocol::run_models::StageReport;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Launch the experiment-runner agent and wait for it.
///
/// A non-zero exit is an unsuccessful stage report, not an error; only
/// spawn-level failures surface as [`ExecError`].
pub async fn run_experiment(
    idea: &IdeaSpec,
    work_dir: &Path,
    command: &ProviderCommand,
    timeout: Duration,
    full_permissions: bool,
    mode: SessionMode,
) -> Result<StageReport, ExecError> {
    let provider = command.provider;
    let prompt = build_experiment_prompt(idea, work_dir);
    let instructions = build_session_instructions(&prompt, work_dir, mode);

    let logs_dir = work_dir.join("logs");
    save_artifact(&logs_dir.join("research_prompt.txt"), &prompt);
    save_artifact(&logs_dir.join("session_instructions.txt"), &instructions);

    let log_file = logs_dir.join(format!("execution_{provider}.log"));
    let transcript_file = logs_dir.join(format!("execution_{provider}_transcript.jsonl"));

    println!("📝 Research prompt generated ({} chars)", prompt.len());
    println!("▶️  Launching {provider} experiment agent...");
    println!("   Log file: {}", log_file.display());
    println!("   Transcript: {}", transcript_file.display());

    let report = run_agent(
        ExecRequest::new(
            command.argv(full_permissions),
            instructions,
            work_dir,
            timeout,
            log_file,
        )
        .with_transcript(transcript_file)
        .with_env(command.env.clone())
        .with_echo(true),
    )
    .await?;

    let elapsed = report.elapsed.as_secs_f64();
    println!(
        "⏱️  Experiment runner finished in {elapsed:.1}s ({:.1} minutes)",
        elapsed / 60.0
    );
    match report.exit_code {
        Some(0) => println!("✅ Experiment execution completed successfully"),
        Some(code) => println!("⚠️  Experiment execution finished with return code {code}"),
        None => {}
    }

    Ok(stage_report_from_exec(&report))
}

fn save_artifact(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(err) = std::fs::write(path, content) {
        warn!(path = %path.display(), error = %err, "could not save prompt artifact");
    }
}
