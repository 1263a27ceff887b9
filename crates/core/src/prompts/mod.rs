//! Prompt assembly for the agent stages.
//!
//! Templates are markdown files with YAML front matter embedded into the
//! binary; the builders prepend an idea-specific context header and fill in
//! the placeholders. Builders are pure: the caller decides where (and
//! whether) to persist the assembled text.

pub mod builder;
pub mod templates;

pub use builder::{
    build_experiment_prompt, build_paper_writer_prompt, build_resource_finder_prompt,
    build_session_instructions, SessionMode,
};
pub use templates::{load_template, PromptTemplate};
