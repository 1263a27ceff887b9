//! Multi-stage research pipeline orchestrator.
//!
//! Stage order: resource_finder -> (optional) human_review ->
//! experiment_runner. Paper writing is a post-step owned by the runner and
//! is not tracked in pipeline state.
//!
//! Stage outcomes are values, never exceptions: a failed agent run is
//! recorded into state and reported in the returned [`PipelineReport`].
//! Raised errors are reserved for failures the orchestrator cannot work
//! around (state persistence, spawn-level misconfiguration in the
//! resource-finder stage).

use crate::agents::experiment_runner::run_experiment;
use crate::agents::resource_finder::run_resource_finder;
use crate::config::AppConfig;
use crate::pipeline::state::{PipelineState, RESULTS_FILE, STATE_DIR};
use crate::prompts::SessionMode;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rk_protocol::idea_models::IdeaSpec;
use rk_protocol::provider_models::Provider;
use rk_protocol::run_models::{PipelineReport, StageReport};
use rk_protocol::stage_models::Stage;
use serde_json::{Map, Value};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const BANNER: &str = "════════════════════════════════════════════════════════════════════════════════";
const RULE: &str = "────────────────────────────────────────────────────────────────────────────────";

/// Per-run options supplied by the caller.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub provider: Provider,
    pub pause_after_resources: bool,
    pub skip_resource_finder: bool,
    pub resource_finder_timeout: Duration,
    pub experiment_timeout: Duration,
    pub full_permissions: bool,
    pub session_mode: SessionMode,
}

impl PipelineOptions {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            pause_after_resources: false,
            skip_resource_finder: false,
            // 45 minutes
            resource_finder_timeout: Duration::from_secs(2700),
            // 3 hours
            experiment_timeout: Duration::from_secs(10_800),
            full_permissions: true,
            session_mode: SessionMode::RawCli,
        }
    }
}

/// Operator checkpoint between resource gathering and experimentation.
#[async_trait]
pub trait ReviewGate: Send + Sync {
    /// Ask whether the pipeline may continue past the gathered resources.
    async fn approve(&self, work_dir: &Path) -> bool;
}

/// Interactive gate reading a yes/no answer from standard input.
pub struct ConsoleReviewGate;

#[async_trait]
impl ReviewGate for ConsoleReviewGate {
    async fn approve(&self, work_dir: &Path) -> bool {
        println!("🛑 Pipeline paused for human review.");
        println!();
        println!("Please review the gathered resources:");
        println!("   - Literature review: {}", work_dir.join("literature_review.md").display());
        println!("   - Resources catalog: {}", work_dir.join("resources.md").display());
        println!("   - Papers: {}", work_dir.join("papers").display());
        println!("   - Datasets: {}", work_dir.join("datasets").display());
        println!("   - Code: {}", work_dir.join("code").display());
        println!();
        print!("Continue with experiment runner? (yes/no): ");
        let _ = std::io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            line
        })
        .await
        .unwrap_or_default();

        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Fixed-answer gate for non-interactive callers and tests.
pub struct StaticReviewGate(pub bool);

#[async_trait]
impl ReviewGate for StaticReviewGate {
    async fn approve(&self, _work_dir: &Path) -> bool {
        self.0
    }
}

/// Sequences the pipeline stages against one working directory.
///
/// The orchestrator is the sole mutator of that directory's pipeline state.
pub struct PipelineOrchestrator {
    work_dir: PathBuf,
    state: PipelineState,
    config: AppConfig,
    review_gate: Box<dyn ReviewGate>,
}

impl PipelineOrchestrator {
    /// Open (or resume) the pipeline state for `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>, config: AppConfig) -> Result<Self> {
        let work_dir = work_dir.into();
        let state = PipelineState::open(&work_dir)?;
        Ok(Self {
            work_dir,
            state,
            config,
            review_gate: Box::new(ConsoleReviewGate),
        })
    }

    pub fn with_review_gate(mut self, gate: Box<dyn ReviewGate>) -> Self {
        self.review_gate = gate;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Execute the pipeline and return stage-by-stage results.
    ///
    /// Errors are raised only when the orchestrator itself cannot proceed
    /// (state persistence, or an unspawnable resource-finder command); all
    /// stage-level failures are reported in the returned value. The results
    /// file is written in every case.
    pub async fn run_pipeline(
        &mut self,
        idea: &IdeaSpec,
        opts: &PipelineOptions,
    ) -> Result<PipelineReport> {
        println!();
        println!("{BANNER}");
        println!("MULTI-AGENT RESEARCH PIPELINE");
        println!("{BANNER}");
        println!("Work directory: {}", self.work_dir.display());
        println!("Provider: {}", opts.provider);
        println!("Pause after resources: {}", opts.pause_after_resources);
        println!("Skip resource finder: {}", opts.skip_resource_finder);
        println!("{BANNER}");
        println!();

        let mut report = PipelineReport::new(self.work_dir.clone());
        let outcome = self.run_stages(idea, opts, &mut report).await;
        if let Err(err) = &outcome {
            report.error = Some(err.to_string());
        }
        self.save_results(&report);
        outcome.map(|()| report)
    }

    async fn run_stages(
        &mut self,
        idea: &IdeaSpec,
        opts: &PipelineOptions,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let command = self.config.provider_command(opts.provider);

        // STAGE 1: resource finder
        if opts.skip_resource_finder {
            println!("⏭️  Skipping resource finder stage (resources assumed to be ready)");
            let mut outputs = Map::new();
            outputs.insert("skipped".to_string(), Value::Bool(true));
            self.state
                .complete_stage(Stage::ResourceFinder, true, Some(outputs))?;
            report.insert_stage(Stage::ResourceFinder, StageReport::skipped());
        } else {
            println!("{RULE}");
            println!("STAGE 1: RESOURCE FINDER");
            println!("{RULE}");
            println!();

            self.state.start_stage(Stage::ResourceFinder)?;
            let stage = match run_resource_finder(
                idea,
                &self.work_dir,
                &command,
                opts.resource_finder_timeout,
                opts.full_permissions,
            )
            .await
            {
                Ok(stage) => stage,
                Err(err) => {
                    // Spawn-level misconfiguration: record the failure,
                    // then let it propagate.
                    self.state
                        .complete_stage(Stage::ResourceFinder, false, None)?;
                    report.insert_stage(
                        Stage::ResourceFinder,
                        StageReport::failure(err.to_string()),
                    );
                    return Err(err.into());
                }
            };

            self.state.complete_stage(
                Stage::ResourceFinder,
                stage.success,
                Some(stage.outputs.clone()),
            )?;
            let succeeded = stage.success;
            report.insert_stage(Stage::ResourceFinder, stage);

            if !succeeded {
                println!();
                println!("⚠️  Resource finder stage failed!");
                println!("   You can:");
                println!("   1. Review logs and fix issues");
                println!("   2. Re-run with --skip-resource-finder if resources are already gathered");
                println!("   3. Manually add resources to the workspace and continue");
                return Ok(());
            }
        }

        // STAGE 2: human review (optional)
        if opts.pause_after_resources {
            println!();
            println!("{RULE}");
            println!("STAGE 2: HUMAN REVIEW CHECKPOINT");
            println!("{RULE}");
            println!();

            self.state.start_stage(Stage::HumanReview)?;
            let approved = self.review_gate.approve(&self.work_dir).await;

            let mut outputs = Map::new();
            outputs.insert("approved".to_string(), Value::Bool(approved));
            outputs.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
            self.state
                .complete_stage(Stage::HumanReview, approved, Some(outputs.clone()))?;
            report.insert_stage(
                Stage::HumanReview,
                StageReport {
                    success: approved,
                    outputs,
                    ..Default::default()
                },
            );

            if !approved {
                println!();
                println!("🛑 Pipeline paused. Human did not approve continuation.");
                return Ok(());
            }
            println!("✅ Proceeding to experiment runner stage...");
        }

        // STAGE 3: experiment runner (always attempted once reached)
        println!();
        println!("{RULE}");
        println!("STAGE 3: EXPERIMENT RUNNER");
        println!("{RULE}");
        println!();

        self.state.start_stage(Stage::ExperimentRunner)?;
        let stage = match run_experiment(
            idea,
            &self.work_dir,
            &command,
            opts.experiment_timeout,
            opts.full_permissions,
            opts.session_mode,
        )
        .await
        {
            Ok(stage) => stage,
            Err(err) => {
                // The terminal, most expensive stage: report rather than
                // raise, so finalization still runs.
                println!("❌ Experiment runner stage failed: {err}");
                self.state
                    .complete_stage(Stage::ExperimentRunner, false, None)?;
                report.insert_stage(
                    Stage::ExperimentRunner,
                    StageReport::failure(err.to_string()),
                );
                return Ok(());
            }
        };

        self.state.complete_stage(
            Stage::ExperimentRunner,
            stage.success,
            Some(stage.outputs.clone()),
        )?;
        let succeeded = stage.success;
        report.insert_stage(Stage::ExperimentRunner, stage);

        if succeeded {
            println!();
            println!("🎉 PIPELINE COMPLETED SUCCESSFULLY!");
            self.state.mark_completed()?;
            report.success = true;
        } else {
            println!();
            println!("⚠️  Experiment runner stage completed with issues.");
        }

        Ok(())
    }

    /// Re-enter the pipeline, skipping stages already completed.
    ///
    /// Short-circuits without invoking anything when both tracked stages
    /// already succeeded. The experiment stage is never skipped by resume:
    /// partial experiment output is not trusted, so it re-runs whenever it
    /// has not previously succeeded.
    pub async fn resume_pipeline(
        &mut self,
        idea: &IdeaSpec,
        opts: &PipelineOptions,
    ) -> Result<PipelineReport> {
        println!();
        println!("🔄 Resuming pipeline from last state...");
        println!();

        let resource_finder_done = self.state.is_stage_completed(Stage::ResourceFinder);
        let experiment_done = self.state.is_stage_completed(Stage::ExperimentRunner);

        println!(
            "   Resource finder: {}",
            if resource_finder_done { "✅ completed" } else { "❌ not completed" }
        );
        println!(
            "   Experiment runner: {}",
            if experiment_done { "✅ completed" } else { "❌ not completed" }
        );
        println!();

        if resource_finder_done && experiment_done {
            println!("✅ All stages already completed!");
            let mut report = PipelineReport::new(self.work_dir.clone());
            report.success = true;
            report.resumed = Some(false);
            report.message = Some("Pipeline already complete".to_string());
            return Ok(report);
        }

        let opts = PipelineOptions {
            skip_resource_finder: resource_finder_done,
            ..opts.clone()
        };
        self.run_pipeline(idea, &opts).await
    }

    /// Serialize the report to `.pipeline/pipeline_results.json`.
    fn save_results(&self, report: &PipelineReport) {
        let path = self.work_dir.join(STATE_DIR).join(RESULTS_FILE);
        let json = match serde_json::to_string_pretty(report) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "could not serialize pipeline results");
                return;
            }
        };
        if let Err(err) = std::fs::write(&path, json) {
            warn!(path = %path.display(), error = %err, "could not save pipeline results");
        } else {
            println!();
            println!("📄 Pipeline results saved to: {}", path.display());
        }
    }
}
