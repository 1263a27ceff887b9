//! Prompt builders: idea context + embedded template bodies.

use crate::prompts::templates::load_template;
use rk_protocol::idea_models::{DatasetRef, IdeaSpec, PaperRef};
use std::fmt::Write as _;
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";

/// How the experiment agent should structure its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Plain scripts executed directly (the default).
    RawCli,
    /// Jupyter notebooks under `notebooks/`.
    Notebook,
}

impl SessionMode {
    fn template_path(self) -> &'static str {
        match self {
            SessionMode::RawCli => "session/raw_cli.md",
            SessionMode::Notebook => "session/notebook.md",
        }
    }
}

#[allow(clippy::expect_used)]
fn template_body(path: &str) -> String {
    // Templates are embedded at compile time; a miss is a build defect.
    load_template(path)
        .expect("embedded prompt template must exist")
        .body
}

/// The research-topic header shared by all idea-driven prompts.
fn research_context(idea: &IdeaSpec) -> String {
    let mut ctx = String::new();
    let _ = writeln!(ctx, "{RULE}");
    let _ = writeln!(ctx, "                         RESEARCH TOPIC SPECIFICATION");
    let _ = writeln!(ctx, "{RULE}");
    let _ = writeln!(ctx);
    let _ = writeln!(ctx, "RESEARCH TITLE:\n{}\n", idea.title_or_default());
    let _ = writeln!(
        ctx,
        "RESEARCH HYPOTHESIS:\n{}\n",
        idea.hypothesis.as_deref().unwrap_or("")
    );
    let _ = writeln!(ctx, "RESEARCH DOMAIN:\n{}", idea.domain_or_default());

    if let Some(background) = idea.background.as_ref().filter(|b| !b.is_empty()) {
        let _ = writeln!(ctx, "\nBACKGROUND INFORMATION:");
        if let Some(context) = &background.context {
            let _ = writeln!(ctx, "\nContext:\n{context}");
        }
        if !background.papers.is_empty() {
            let _ = writeln!(ctx, "\nRelevant papers mentioned:");
            for paper in &background.papers {
                match paper {
                    PaperRef::Titled { title, url: Some(url) } => {
                        let _ = writeln!(ctx, "- {title} ({url})");
                    }
                    PaperRef::Titled { title, url: None } => {
                        let _ = writeln!(ctx, "- {title}");
                    }
                    PaperRef::Plain(text) => {
                        let _ = writeln!(ctx, "- {text}");
                    }
                }
            }
        }
        if !background.datasets.is_empty() {
            let _ = writeln!(ctx, "\nRelevant datasets mentioned:");
            for dataset in &background.datasets {
                match dataset {
                    DatasetRef::Named { name, source: Some(source) } => {
                        let _ = writeln!(ctx, "- {name} (from: {source})");
                    }
                    DatasetRef::Named { name, source: None } => {
                        let _ = writeln!(ctx, "- {name}");
                    }
                    DatasetRef::Plain(text) => {
                        let _ = writeln!(ctx, "- {text}");
                    }
                }
            }
        }
        if let Some(related) = &background.related_work {
            let _ = writeln!(ctx, "\nRelated work:\n{related}");
        }
    }

    if let Some(constraints) = idea.constraints.as_ref().filter(|c| !c.is_empty()) {
        let _ = writeln!(ctx, "\nCONSTRAINTS AND REQUIREMENTS:");
        if let Some(computational) = &constraints.computational {
            let _ = writeln!(ctx, "Computational: {computational}");
        }
        if let Some(time) = &constraints.time {
            let _ = writeln!(ctx, "Time: {time}");
        }
        if let Some(budget) = &constraints.budget {
            let _ = writeln!(ctx, "Budget: {budget}");
        }
        if let Some(other) = &constraints.other {
            let _ = writeln!(ctx, "Other: {other}");
        }
    }

    if !idea.expected_outputs.is_empty() {
        let _ = writeln!(ctx, "\nEXPECTED OUTPUTS:");
        for output in &idea.expected_outputs {
            let kind = output.kind.as_deref().unwrap_or("artifact");
            let format = output.format.as_deref().unwrap_or("any");
            if output.fields.is_empty() {
                let _ = writeln!(ctx, "- {kind} ({format})");
            } else {
                let _ = writeln!(ctx, "- {kind} ({format}): {}", output.fields.join(", "));
            }
        }
    }

    if !idea.evaluation_criteria.is_empty() {
        let _ = writeln!(ctx, "\nEVALUATION CRITERIA:");
        for criterion in &idea.evaluation_criteria {
            let _ = writeln!(ctx, "- {criterion}");
        }
    }

    let _ = writeln!(ctx, "\n{RULE}");
    ctx
}

/// Prompt for the resource-finder agent.
pub fn build_resource_finder_prompt(idea: &IdeaSpec) -> String {
    format!(
        "{}\n{}\n",
        research_context(idea),
        template_body("agents/resource_finder.md")
    )
}

/// Resource-aware prompt for the experiment-runner agent.
pub fn build_experiment_prompt(idea: &IdeaSpec, work_dir: &Path) -> String {
    let body = template_body("agents/experiment_runner.md");
    format!(
        "{}\nWORKSPACE: {}\n\n{}\n",
        research_context(idea),
        work_dir.display(),
        body
    )
}

/// Wrap a research prompt in session instructions for the chosen mode.
pub fn build_session_instructions(prompt: &str, work_dir: &Path, mode: SessionMode) -> String {
    template_body(mode.template_path())
        .replace("{{work_dir}}", &work_dir.display().to_string())
        .replace("{{prompt}}", prompt)
}

/// Prompt for the paper-writer agent.
pub fn build_paper_writer_prompt(work_dir: &Path, style: &str) -> String {
    let body = template_body("agents/paper_writer.md").replace("{{style}}", style);
    format!("WORKSPACE: {}\n\n{}\n", work_dir.display(), body)
}
