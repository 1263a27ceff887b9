//! Integration tests for the pipeline orchestrator.
//!
//! These drive the real orchestrator against `sh -c` stand-in agents in
//! temporary working directories, covering the stage-sequencing, abort,
//! skip, human-review and resume behaviors end to end.

mod common;

use common::{config_with_script, test_idea, TEST_PROVIDER};
use rk_core::pipeline::{PipelineOptions, PipelineOrchestrator, StaticReviewGate};
use rk_protocol::stage_models::{Stage, StageStatus};
use std::path::Path;
use std::time::Duration;

fn options() -> PipelineOptions {
    let mut opts = PipelineOptions::new(TEST_PROVIDER);
    opts.resource_finder_timeout = Duration::from_secs(30);
    opts.experiment_timeout = Duration::from_secs(30);
    opts.full_permissions = false;
    opts
}

/// Counts how many agent processes were spawned by the fixture scripts.
fn spawn_count(work_dir: &Path) -> usize {
    std::fs::read_to_string(work_dir.join("runs.txt"))
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

/// Script that succeeds for both stages: creates the resource-finder
/// completion marker and records each spawn.
const HAPPY_SCRIPT: &str =
    "cat > /dev/null; echo spawn >> runs.txt; touch .resource_finder_complete; echo working";

#[tokio::test]
async fn test_full_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT)).unwrap();

    let report = orchestrator
        .run_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    assert!(report.success);
    let rf = report.stage(Stage::ResourceFinder).unwrap();
    assert!(rf.success);
    assert_eq!(rf.return_code, Some(0));
    let er = report.stage(Stage::ExperimentRunner).unwrap();
    assert!(er.success);

    let state = orchestrator.state();
    assert!(state.data().completed);
    assert!(state.data().completed_at.is_some());
    assert!(state.is_stage_completed(Stage::ResourceFinder));
    assert!(state.is_stage_completed(Stage::ExperimentRunner));
    assert!(state.data().current_stage.is_none());

    // One spawn per stage.
    assert_eq!(spawn_count(dir.path()), 2);
}

#[tokio::test]
async fn test_resource_finder_failure_aborts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    // No completion marker, non-zero exit.
    let script = "cat > /dev/null; echo spawn >> runs.txt; exit 1";
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(script)).unwrap();

    let report = orchestrator
        .run_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    assert!(!report.success);
    assert!(!report.stage(Stage::ResourceFinder).unwrap().success);
    // The experiment stage was never entered.
    assert!(report.stage(Stage::ExperimentRunner).is_none());

    let state = orchestrator.state();
    assert_eq!(
        state.stage_status(Stage::ResourceFinder),
        Some(StageStatus::Failed)
    );
    assert!(state.stage_status(Stage::ExperimentRunner).is_none());
    assert!(!state.data().completed);
    assert_eq!(spawn_count(dir.path()), 1);
}

#[tokio::test]
async fn test_skip_resource_finder_spawns_nothing_for_stage_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT)).unwrap();

    let mut opts = options();
    opts.skip_resource_finder = true;
    let report = orchestrator
        .run_pipeline(&test_idea(), &opts)
        .await
        .unwrap();

    assert!(report.success);
    let rf = report.stage(Stage::ResourceFinder).unwrap();
    assert!(rf.skipped);
    assert!(rf.success);

    let state = orchestrator.state();
    assert!(state.is_stage_completed(Stage::ResourceFinder));
    // The skipped stage was never started: no start timestamp, and only
    // the experiment stage spawned a process.
    let record = &state.data().stages["resource_finder"];
    assert!(record.started_at.is_none());
    assert_eq!(record.outputs["skipped"], serde_json::Value::Bool(true));
    assert_eq!(spawn_count(dir.path()), 1);
}

#[tokio::test]
async fn test_declined_human_review_stops_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT))
            .unwrap()
            .with_review_gate(Box::new(StaticReviewGate(false)));

    let mut opts = options();
    opts.pause_after_resources = true;
    let report = orchestrator
        .run_pipeline(&test_idea(), &opts)
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.stage(Stage::ResourceFinder).unwrap().success);
    let review = report.stage(Stage::HumanReview).unwrap();
    assert!(!review.success);
    assert_eq!(review.outputs["approved"], serde_json::Value::Bool(false));
    assert!(report.stage(Stage::ExperimentRunner).is_none());

    let state = orchestrator.state();
    assert_eq!(
        state.stage_status(Stage::HumanReview),
        Some(StageStatus::Failed)
    );
    assert!(state.stage_status(Stage::ExperimentRunner).is_none());
    // Only the resource finder ran.
    assert_eq!(spawn_count(dir.path()), 1);
}

#[tokio::test]
async fn test_approved_human_review_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT))
            .unwrap()
            .with_review_gate(Box::new(StaticReviewGate(true)));

    let mut opts = options();
    opts.pause_after_resources = true;
    let report = orchestrator
        .run_pipeline(&test_idea(), &opts)
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.stage(Stage::HumanReview).unwrap().success);
    assert!(orchestrator.state().is_stage_completed(Stage::HumanReview));
    assert_eq!(spawn_count(dir.path()), 2);
}

#[tokio::test]
async fn test_experiment_failure_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    // Resource finder succeeds (marker), but every run exits non-zero, so
    // the experiment stage fails.
    let script =
        "cat > /dev/null; echo spawn >> runs.txt; touch .resource_finder_complete; exit 5";
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(script)).unwrap();

    let report = orchestrator
        .run_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.stage(Stage::ResourceFinder).unwrap().success);
    let er = report.stage(Stage::ExperimentRunner).unwrap();
    assert!(!er.success);
    assert_eq!(er.return_code, Some(5));

    let state = orchestrator.state();
    assert_eq!(
        state.stage_status(Stage::ExperimentRunner),
        Some(StageStatus::Failed)
    );
    assert!(!state.data().completed);
}

#[tokio::test]
async fn test_results_file_written_on_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = "cat > /dev/null; exit 1";
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(script)).unwrap();
    orchestrator
        .run_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    let results_path = dir.path().join(".pipeline/pipeline_results.json");
    assert!(results_path.exists());
    let results: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(results_path).unwrap()).unwrap();
    assert_eq!(results["success"], serde_json::Value::Bool(false));
    assert!(results["stages"]["resource_finder"].is_object());
}

#[tokio::test]
async fn test_resume_short_circuits_when_all_stages_done() {
    let dir = tempfile::tempdir().unwrap();

    // First run: full success.
    {
        let mut orchestrator =
            PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT)).unwrap();
        let report = orchestrator
            .run_pipeline(&test_idea(), &options())
            .await
            .unwrap();
        assert!(report.success);
    }
    assert_eq!(spawn_count(dir.path()), 2);

    // Resume with a script that would fail loudly if anything spawned.
    let poison = "cat > /dev/null; echo spawn >> runs.txt; exit 9";
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(poison)).unwrap();
    let report = orchestrator
        .resume_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.resumed, Some(false));
    assert!(report.message.as_deref().unwrap_or("").contains("already complete"));
    // Nothing new spawned.
    assert_eq!(spawn_count(dir.path()), 2);
}

#[tokio::test]
async fn test_resume_skips_completed_resource_finder_and_reruns_experiment() {
    let dir = tempfile::tempdir().unwrap();

    // First run: the marker makes the resource finder succeed; every exit
    // is non-zero so the experiment stage fails.
    {
        let script =
            "cat > /dev/null; echo spawn >> runs.txt; touch .resource_finder_complete; exit 1";
        let mut orchestrator =
            PipelineOrchestrator::new(dir.path(), config_with_script(script)).unwrap();
        let report = orchestrator
            .run_pipeline(&test_idea(), &options())
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.stage(Stage::ResourceFinder).unwrap().success);
    }
    assert_eq!(spawn_count(dir.path()), 2);

    // Resume: resource finder must be skipped, experiment re-run with a
    // now-succeeding script.
    let script = "cat > /dev/null; echo spawn >> runs.txt; echo fixed";
    let mut orchestrator =
        PipelineOrchestrator::new(dir.path(), config_with_script(script)).unwrap();
    let report = orchestrator
        .resume_pipeline(&test_idea(), &options())
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.stage(Stage::ResourceFinder).unwrap().skipped);
    assert!(report.stage(Stage::ExperimentRunner).unwrap().success);
    // Exactly one more spawn: the experiment re-run.
    assert_eq!(spawn_count(dir.path()), 3);
    assert!(orchestrator.state().data().completed);
}

#[tokio::test]
async fn test_state_survives_across_orchestrator_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut orchestrator =
            PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT)).unwrap();
        orchestrator
            .run_pipeline(&test_idea(), &options())
            .await
            .unwrap();
    }

    let reopened =
        PipelineOrchestrator::new(dir.path(), config_with_script(HAPPY_SCRIPT)).unwrap();
    assert!(reopened.state().data().completed);
    assert!(reopened.state().is_stage_completed(Stage::ResourceFinder));
    assert!(reopened.state().is_stage_completed(Stage::ExperimentRunner));
}

#[tokio::test]
async fn test_missing_agent_binary_fails_fast_and_records_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_script("unused");
    if let Some(over) = config.providers.get_mut("claude") {
        over.program = Some("definitely-not-a-real-binary-xyz".to_string());
    }
    let mut orchestrator = PipelineOrchestrator::new(dir.path(), config).unwrap();

    let result = orchestrator.run_pipeline(&test_idea(), &options()).await;
    assert!(result.is_err());

    // The failure was recorded before propagating.
    assert_eq!(
        orchestrator.state().stage_status(Stage::ResourceFinder),
        Some(StageStatus::Failed)
    );
}
