//! research-kit command-line interface.
//!
//! Exit code is 0 only when the requested operation fully succeeded; any
//! pipeline failure or setup error exits 1.

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::eyre;
use colored::Colorize;
use rk_core::config::load_config;
use rk_core::ideas::IdeaStore;
use rk_core::prompts::SessionMode;
use rk_core::runner::{ResearchRunner, RunOptions};
use rk_protocol::idea_models::{IdeaDocument, IdeaStatus};
use rk_protocol::provider_models::Provider;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "research-kit",
    about = "Run autonomous research pipelines with external coding-agent CLIs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the research pipeline for a submitted idea.
    Run(RunArgs),

    /// Resume an interrupted pipeline, skipping completed stages.
    Resume(RunArgs),

    /// Validate and store an idea YAML file.
    Submit {
        /// Path to the idea YAML document.
        file: PathBuf,

        /// Store the idea even when validation fails.
        #[arg(long)]
        no_validate: bool,
    },

    /// List stored ideas.
    List {
        /// Filter by status (submitted, in_progress, completed).
        #[arg(long)]
        status: Option<String>,
    },

    /// Validate an idea YAML file without storing it.
    Validate {
        /// Path to the idea YAML document.
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Identifier of the idea to run.
    idea_id: String,

    /// AI provider (claude, codex, gemini).
    #[arg(long, default_value = "claude")]
    provider: String,

    /// Experiment-runner timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Resource-finder timeout in seconds.
    #[arg(long)]
    resource_finder_timeout: Option<u64>,

    /// Paper-writer timeout in seconds.
    #[arg(long)]
    paper_timeout: Option<u64>,

    /// Pause for human review after the resource-finder stage.
    #[arg(long)]
    pause_after_resources: bool,

    /// Skip the resource-finder stage (resources already gathered).
    #[arg(long)]
    skip_resource_finder: bool,

    /// Use the legacy monolithic agent instead of the staged pipeline.
    #[arg(long)]
    legacy_mode: bool,

    /// Generate a paper draft after experiments complete.
    #[arg(long)]
    write_paper: bool,

    /// Paper style template (neurips, icml, acl).
    #[arg(long, default_value = "neurips")]
    paper_style: String,

    /// Allow agents to bypass their interactive permission prompts.
    #[arg(long)]
    full_permissions: bool,

    /// Disable hosting-service integration (run locally only).
    #[arg(long)]
    no_github: bool,

    /// Skip the random hash in generated repository names.
    #[arg(long)]
    no_hash: bool,

    /// Have the experiment agent work in notebooks instead of scripts.
    #[arg(long)]
    notebook_mode: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let root = std::env::current_dir()?;

    match cli.command {
        Commands::Run(args) => run(&root, args, false).await,
        Commands::Resume(args) => run(&root, args, true).await,
        Commands::Submit { file, no_validate } => submit(&root, &file, !no_validate),
        Commands::List { status } => list(&root, status.as_deref()),
        Commands::Validate { file } => validate(&file),
    }
}

async fn run(root: &std::path::Path, args: RunArgs, resume: bool) -> color_eyre::Result<()> {
    let provider: Provider = args.provider.parse().map_err(|e: String| eyre!(e))?;
    let config = load_config(root).map_err(|e| eyre!(e.to_string()))?;

    let command = config.provider_command(provider);
    if !rk_core::agents::provider_available(&command.program) {
        println!(
            "{} provider executable '{}' not found on PATH; agent stages will fail",
            "warning:".yellow().bold(),
            command.program
        );
    }

    let mut opts = RunOptions::new(provider);
    opts.experiment_timeout = args.timeout.map(Duration::from_secs);
    opts.resource_finder_timeout = args.resource_finder_timeout.map(Duration::from_secs);
    opts.paper_timeout = args.paper_timeout.map(Duration::from_secs);
    opts.full_permissions = args.full_permissions;
    opts.pause_after_resources = args.pause_after_resources;
    opts.skip_resource_finder = args.skip_resource_finder;
    opts.write_paper = args.write_paper;
    opts.paper_style = args.paper_style;
    opts.legacy_mode = args.legacy_mode;
    opts.resume = resume;
    opts.no_hash = args.no_hash;
    opts.session_mode = if args.notebook_mode {
        SessionMode::Notebook
    } else {
        SessionMode::RawCli
    };

    let mut runner = ResearchRunner::new(root, config, !args.no_github)
        .map_err(|e| eyre!(e.to_string()))?;
    let summary = runner
        .run_research(&args.idea_id, &opts)
        .await
        .map_err(|e| eyre!(e.to_string()))?;

    println!();
    println!("{}", "=".repeat(80));
    if summary.success {
        println!("{} Research execution completed.", "SUCCESS!".green().bold());
    } else {
        println!("{} Research finished with failures.", "FAILED!".red().bold());
    }
    println!("Location: {}", summary.work_dir.display());
    if let Some(url) = &summary.repo_url {
        println!("GitHub: {url}");
    }
    println!("{}", "=".repeat(80));

    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}

fn submit(root: &std::path::Path, file: &std::path::Path, validate: bool) -> color_eyre::Result<()> {
    let doc = read_idea_file(file)?;
    let store = IdeaStore::new(root.join("ideas")).map_err(|e| eyre!(e.to_string()))?;
    let idea_id = store.submit(doc, validate).map_err(|e| eyre!(e.to_string()))?;

    println!("{} Idea submitted: {}", "✓".green(), idea_id.bold());
    println!("  Run it with: research-kit run {idea_id}");
    Ok(())
}

fn list(root: &std::path::Path, status: Option<&str>) -> color_eyre::Result<()> {
    let status = match status {
        Some(text) => Some(text.parse::<IdeaStatus>().map_err(|e| eyre!(e))?),
        None => None,
    };
    let store = IdeaStore::new(root.join("ideas")).map_err(|e| eyre!(e.to_string()))?;
    let summaries = store.list(status).map_err(|e| eyre!(e.to_string()))?;

    if summaries.is_empty() {
        println!("No ideas found.");
        return Ok(());
    }
    for summary in summaries {
        let status = summary
            .status
            .map_or_else(|| "unknown".to_string(), |s| s.to_string());
        let status = match status.as_str() {
            "submitted" => status.cyan(),
            "in_progress" => status.yellow(),
            "completed" => status.green(),
            _ => status.normal(),
        };
        println!(
            "{:<12} {}  [{}]  {}",
            status,
            summary.idea_id.bold(),
            summary.domain,
            summary.title
        );
    }
    Ok(())
}

fn validate(file: &std::path::Path) -> color_eyre::Result<()> {
    let doc = read_idea_file(file)?;
    let report = IdeaStore::validate(&doc);

    for error in &report.errors {
        println!("{} {error}", "error:".red().bold());
    }
    for warning in &report.warnings {
        println!("{} {warning}", "warning:".yellow().bold());
    }
    if report.valid {
        println!("{} idea is valid", "✓".green());
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn read_idea_file(file: &std::path::Path) -> color_eyre::Result<IdeaDocument> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("could not read {}: {e}", file.display()))?;
    serde_yaml::from_str(&content).map_err(|e| eyre!("malformed idea file: {e}"))
}
