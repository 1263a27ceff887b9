//! Top-level research runner.
//!
//! Loads the idea, prepares a working directory (hosting repository or
//! local), drives the pipeline orchestrator, optionally drafts a paper,
//! and finalizes: publish the workspace and update the idea's status.
//! Finalization always runs, whatever path the run took.

use crate::agents::paper_writer::run_paper_writer;
use crate::agents::experiment_runner::run_experiment;
use crate::config::AppConfig;
use crate::ideas::IdeaStore;
use crate::pipeline::{PipelineOptions, PipelineOrchestrator, ReviewGate};
use crate::prompts::SessionMode;
use crate::publish::{Git, GitHubPublisher};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rk_protocol::idea_models::{IdeaDocument, IdeaStatus};
use rk_protocol::provider_models::Provider;
use rk_protocol::run_models::RunSummary;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const BANNER: &str = "════════════════════════════════════════════════════════════════════════════════";

/// Options for one `run_research` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub provider: Provider,

    /// Per-stage timeout overrides; configuration defaults apply when unset.
    pub experiment_timeout: Option<Duration>,
    pub resource_finder_timeout: Option<Duration>,
    pub paper_timeout: Option<Duration>,

    pub full_permissions: bool,
    pub pause_after_resources: bool,
    pub skip_resource_finder: bool,
    pub write_paper: bool,
    pub paper_style: String,

    /// Single monolithic agent run instead of the staged pipeline.
    pub legacy_mode: bool,

    /// Re-enter an interrupted pipeline instead of starting fresh.
    pub resume: bool,

    /// Skip the random hash in generated repository names.
    pub no_hash: bool,

    pub session_mode: SessionMode,
}

impl RunOptions {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            experiment_timeout: None,
            resource_finder_timeout: None,
            paper_timeout: None,
            full_permissions: false,
            pause_after_resources: false,
            skip_resource_finder: false,
            write_paper: false,
            paper_style: "neurips".to_string(),
            legacy_mode: false,
            resume: false,
            no_hash: false,
            session_mode: SessionMode::RawCli,
        }
    }
}

/// Runs research experiments for submitted ideas.
pub struct ResearchRunner {
    config: AppConfig,
    ideas: IdeaStore,
    publisher: Option<GitHubPublisher>,
    review_gate: Option<Box<dyn ReviewGate>>,
}

impl ResearchRunner {
    /// Build a runner rooted at `project_root` (ideas live in
    /// `<project_root>/ideas`).
    pub fn new(project_root: &Path, config: AppConfig, use_github: bool) -> Result<Self> {
        let ideas = IdeaStore::new(project_root.join("ideas"))?;

        let publisher = if use_github {
            match GitHubPublisher::from_config(&config) {
                Ok(Some(publisher)) => {
                    println!("✅ GitHub integration enabled");
                    Some(publisher)
                }
                Ok(None) => {
                    println!("⚠️  GitHub integration disabled (no token or disabled in config)");
                    None
                }
                Err(err) => {
                    println!("⚠️  GitHub integration failed: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            ideas,
            publisher,
            review_gate: None,
        })
    }

    /// Replace the interactive human-review gate (used by non-interactive
    /// callers and tests).
    pub fn with_review_gate(mut self, gate: Box<dyn ReviewGate>) -> Self {
        self.review_gate = Some(gate);
        self
    }

    pub fn ideas(&self) -> &IdeaStore {
        &self.ideas
    }

    /// Execute research for an idea and return where it happened.
    ///
    /// Errors are raised only for setup problems (unknown idea, unusable
    /// working directory); stage failures are reflected in the returned
    /// `success` flag after finalization has run.
    pub async fn run_research(&mut self, idea_id: &str, opts: &RunOptions) -> Result<RunSummary> {
        println!("🚀 Starting research: {idea_id}");
        println!("   Provider: {}", opts.provider);
        println!(
            "   GitHub: {}",
            if self.publisher.is_some() { "enabled" } else { "disabled" }
        );
        println!("{BANNER}");

        let Some(mut doc) = self.ideas.get(idea_id)? else {
            bail!("idea not found: {idea_id}");
        };
        let title = doc.idea.title_or_default().to_string();

        self.ideas.update_status(idea_id, IdeaStatus::InProgress)?;

        let (work_dir, repo_url) = self.setup_work_dir(idea_id, &mut doc, opts).await?;
        for sub_dir in ["logs", "results", "artifacts"] {
            let dir = work_dir.join(sub_dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        if opts.session_mode == SessionMode::Notebook {
            let _ = std::fs::create_dir_all(work_dir.join("notebooks"));
        }

        let resource_finder_timeout = opts
            .resource_finder_timeout
            .unwrap_or(Duration::from_secs(self.config.timeouts.resource_finder_secs));
        let experiment_timeout = opts
            .experiment_timeout
            .unwrap_or(Duration::from_secs(self.config.timeouts.experiment_secs));
        let paper_timeout = opts
            .paper_timeout
            .unwrap_or(Duration::from_secs(self.config.timeouts.paper_secs));

        // Legacy-mode infrastructure errors re-raise, but only after
        // finalization has had its turn.
        let (success, legacy_err) = if opts.legacy_mode {
            match self.run_legacy(&doc, &work_dir, opts, experiment_timeout).await {
                Ok(success) => (success, None),
                Err(err) => (false, Some(err)),
            }
        } else {
            let success = self
                .run_staged(
                    &doc,
                    &work_dir,
                    opts,
                    resource_finder_timeout,
                    experiment_timeout,
                    paper_timeout,
                )
                .await;
            (success, None)
        };

        self.finalize(idea_id, &work_dir, repo_url.as_deref(), &title, opts.provider, success)
            .await;

        if let Some(err) = legacy_err {
            return Err(err);
        }
        Ok(RunSummary {
            work_dir,
            repo_url,
            success,
        })
    }

    async fn run_staged(
        &mut self,
        doc: &IdeaDocument,
        work_dir: &Path,
        opts: &RunOptions,
        resource_finder_timeout: Duration,
        experiment_timeout: Duration,
        paper_timeout: Duration,
    ) -> bool {
        println!();
        println!("🔀 Using multi-agent pipeline");
        println!("   Stage 1: Resource finder (literature review, datasets, code)");
        println!("   Stage 2: Experiment runner (implementation, experiments, analysis)");
        println!();

        let mut orchestrator = match PipelineOrchestrator::new(work_dir, self.config.clone()) {
            Ok(orchestrator) => orchestrator,
            Err(err) => {
                println!("❌ Could not open pipeline state: {err}");
                return false;
            }
        };
        if let Some(gate) = self.review_gate.take() {
            orchestrator = orchestrator.with_review_gate(gate);
        }

        let pipeline_opts = PipelineOptions {
            provider: opts.provider,
            pause_after_resources: opts.pause_after_resources,
            skip_resource_finder: opts.skip_resource_finder,
            resource_finder_timeout,
            experiment_timeout,
            full_permissions: opts.full_permissions,
            session_mode: opts.session_mode,
        };

        let result = if opts.resume {
            orchestrator.resume_pipeline(&doc.idea, &pipeline_opts).await
        } else {
            orchestrator.run_pipeline(&doc.idea, &pipeline_opts).await
        };

        let success = match result {
            Ok(report) => report.success,
            Err(err) => {
                println!();
                println!("❌ Pipeline error: {err}");
                false
            }
        };

        if opts.write_paper && success {
            println!();
            println!("{BANNER}");
            println!("📝 STAGE: PAPER WRITING");
            println!("{BANNER}");
            println!();

            let command = self.config.provider_command(opts.provider);
            match run_paper_writer(
                work_dir,
                &command,
                &opts.paper_style,
                paper_timeout,
                opts.full_permissions,
            )
            .await
            {
                Ok(stage) if stage.success => {
                    println!("✅ Paper draft generated");
                }
                Ok(_) => {
                    println!("⚠️  Paper generation failed (research still succeeded)");
                }
                Err(err) => {
                    warn!(error = %err, "paper writer could not run");
                    println!("⚠️  Paper writer could not run: {err} (research still succeeded)");
                }
            }
        }

        success
    }

    /// Legacy monolithic mode: one agent handles all phases in a single
    /// run, with no staged state tracking. Infrastructure failures
    /// propagate here, unlike in the staged pipeline.
    async fn run_legacy(
        &self,
        doc: &IdeaDocument,
        work_dir: &Path,
        opts: &RunOptions,
        timeout: Duration,
    ) -> Result<bool> {
        println!();
        println!("⚠️  Using legacy monolithic agent mode");
        println!("   (Single agent handles all phases including literature review)");
        println!();

        let command = self.config.provider_command(opts.provider);
        let stage = run_experiment(
            &doc.idea,
            work_dir,
            &command,
            timeout,
            opts.full_permissions,
            opts.session_mode,
        )
        .await?;
        Ok(stage.success)
    }

    /// Resolve the working directory for a run.
    ///
    /// Preference order: an existing cloned workspace from a previous
    /// submission, a freshly created-and-cloned hosting repository, and
    /// finally a plain local directory.
    async fn setup_work_dir(
        &mut self,
        idea_id: &str,
        doc: &mut IdeaDocument,
        opts: &RunOptions,
    ) -> Result<(PathBuf, Option<String>)> {
        if let Some(publisher) = &self.publisher {
            let known_repo = doc
                .idea
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.repo_name.clone());
            if let Some(repo_name) = known_repo {
                if let Some(path) = publisher.workspace_path(&repo_name) {
                    println!();
                    println!("✅ Using existing workspace from submission");
                    println!("   Local: {}", path.display());
                    if let Err(err) = publisher.pull_latest(&path).await {
                        println!("   ⚠️  Could not pull latest changes: {err}");
                        println!("   Continuing with local version...");
                    }
                    let url = Git::new(&path).remote_url().await.ok();
                    if let Some(url) = &url {
                        println!("   URL: {url}");
                    }
                    return Ok((path, url));
                }
            }

            println!();
            println!("📦 No existing workspace found, creating a repository...");
            let created = publisher
                .create_research_repo(
                    doc.idea.title_or_default(),
                    doc.idea.hypothesis.as_deref().unwrap_or(""),
                    opts.provider,
                    opts.no_hash,
                )
                .await;
            match created {
                Ok((info, local_path)) => match publisher.clone_repo(&info, &local_path).await {
                    Ok(_git) => {
                        let metadata = doc.idea.metadata.get_or_insert_with(Default::default);
                        metadata.repo_name = Some(info.name.clone());
                        metadata.repo_url = Some(info.html_url.clone());
                        if let Err(err) = self.ideas.save(idea_id, doc) {
                            warn!(error = %err, "could not record repository metadata");
                        }
                        println!("✅ Working in hosting repository");
                        println!("   URL: {}", info.html_url);
                        println!("   Local: {}", local_path.display());
                        return Ok((local_path, Some(info.html_url)));
                    }
                    Err(err) => {
                        println!("⚠️  Clone failed: {err}");
                        println!("   Falling back to local execution");
                    }
                },
                Err(err) => {
                    println!("⚠️  Repository setup failed: {err}");
                    println!("   Falling back to local execution");
                }
            }
        }

        // Local execution
        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let run_id = format!("{idea_id}_{}_{timestamp}", opts.provider);
        let work_dir = self.config.workspace.parent_dir.join(run_id);
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("create work dir {}", work_dir.display()))?;
        println!("📁 Working directory: {}", work_dir.display());
        Ok((work_dir, None))
    }

    /// Publish results and update the idea's status. Always runs; publish
    /// failures are warnings, never reasons to abort.
    async fn finalize(
        &self,
        idea_id: &str,
        work_dir: &Path,
        repo_url: Option<&str>,
        title: &str,
        provider: Provider,
        success: bool,
    ) {
        if let Some(publisher) = &self.publisher {
            println!();
            println!("📤 Pushing results to the hosting repository...");
            let status_line = if success { "Success" } else { "Completed with issues" };
            let message = format!(
                "Research execution completed\n\n\
                 Research: {title}\n\
                 Provider: {provider}\n\
                 Status: {status_line}\n\n\
                 Generated by research-kit\n"
            );
            match publisher.publish(work_dir, &message).await {
                Ok(true) => {
                    println!("🎉 Results published!");
                    if let Some(url) = repo_url {
                        println!("   {url}");
                    }
                }
                Ok(false) => println!("   Nothing new to publish"),
                Err(err) => {
                    println!("⚠️  Failed to push results: {err}");
                    println!("   Results are available locally");
                }
            }
        }

        if let Err(err) = self.ideas.update_status(idea_id, IdeaStatus::Completed) {
            warn!(error = %err, "could not update idea status");
        }

        println!();
        println!("✅ Research completed!");
        println!("   Location: {}", work_dir.display());
        if let Some(url) = repo_url {
            println!("   GitHub: {url}");
        }
    }
}
