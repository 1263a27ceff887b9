//! Paper-writer stage: best-effort LaTeX draft from finished experiments.

use crate::agents::exec::{run_agent, ExecError, ExecRequest};
use crate::agents::stage_report_from_exec;
use crate::prompts::build_paper_writer_prompt;
use rk_protocol::provider_models::ProviderCommand;
use rk_protocol::run_models::StageReport;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Directory the draft is written into, created before the agent runs.
pub const DRAFT_DIR: &str = "paper_draft";

/// Launch the paper-writer agent and wait for it.
///
/// Callers treat any failure here as a warning; a missing paper never
/// invalidates the research run itself.
pub async fn run_paper_writer(
    work_dir: &Path,
    command: &ProviderCommand,
    style: &str,
    timeout: Duration,
    full_permissions: bool,
) -> Result<StageReport, ExecError> {
    let provider = command.provider;
    println!("📝 Starting paper writer agent");
    println!("   Style: {style}");
    println!("   Provider: {provider}");

    let draft_dir = work_dir.join(DRAFT_DIR);
    if let Err(err) = std::fs::create_dir_all(&draft_dir) {
        warn!(path = %draft_dir.display(), error = %err, "could not create draft directory");
    }

    let prompt = build_paper_writer_prompt(work_dir, style);
    let logs_dir = work_dir.join("logs");
    if let Err(err) = std::fs::create_dir_all(&logs_dir)
        .and_then(|()| std::fs::write(logs_dir.join("paper_writer_prompt.txt"), &prompt))
    {
        warn!(error = %err, "could not save paper writer prompt");
    }

    let log_file = logs_dir.join(format!("paper_writer_{provider}.log"));

    let report = run_agent(
        ExecRequest::new(
            command.argv(full_permissions),
            prompt,
            work_dir,
            timeout,
            log_file,
        )
        .with_env(command.env.clone())
        .with_echo(true),
    )
    .await?;

    if report.success {
        println!("✅ Paper writer completed: {}", draft_dir.display());
    } else if report.timed_out {
        println!("⏰ Paper generation timed out after {}s", timeout.as_secs());
    } else {
        println!(
            "⚠️  Paper generation failed with return code {:?}",
            report.exit_code
        );
    }

    let mut stage = stage_report_from_exec(&report);
    stage.outputs.insert(
        "draft_dir".to_string(),
        Value::String(draft_dir.display().to_string()),
    );
    Ok(stage)
}
