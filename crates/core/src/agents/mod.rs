//! Agent subprocess execution and the per-stage agent wrappers.

pub mod exec;
pub mod experiment_runner;
pub mod paper_writer;
pub mod resource_finder;

pub use exec::{provider_available, run_agent, ExecError, ExecReport, ExecRequest};

use rk_protocol::run_models::StageReport;

/// Fold a process-runner report into a stage report.
pub fn stage_report_from_exec(report: &ExecReport) -> StageReport {
    StageReport {
        success: report.success,
        skipped: false,
        return_code: report.exit_code,
        timed_out: report.timed_out,
        elapsed_secs: Some(report.elapsed.as_secs_f64()),
        log_file: Some(report.log_file.clone()),
        transcript_file: report.transcript_file.clone(),
        error: report.error.clone(),
        outputs: serde_json::Map::new(),
    }
}
