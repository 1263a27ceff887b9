//! Embedded prompt template files.
//!
//! Templates live in the crate's `templates/` directory and are embedded at
//! compile time, so the binary needs no external template files at runtime.
//! Each template is markdown with YAML front matter carrying its metadata;
//! the body is the prompt text.

use gray_matter::engine::YAML;
use gray_matter::Matter;
use rust_embed::RustEmbed;
use serde::Deserialize;

/// Embedded template files from the crate `templates/` directory.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates"]
struct PromptAssets;

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub description: String,
    /// The prompt text (markdown body below the front matter).
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct TemplateFrontMatter {
    name: String,
    description: String,
}

/// Load a template by its path under `templates/`
/// (e.g. `agents/resource_finder.md`).
pub fn load_template(path: &str) -> Option<PromptTemplate> {
    let raw = PromptAssets::get(path)?;
    let content = String::from_utf8_lossy(raw.data.as_ref()).to_string();

    let matter = Matter::<YAML>::new();
    let parsed = matter.parse(&content);
    let front: TemplateFrontMatter = parsed.data?.deserialize().ok()?;

    Some(PromptTemplate {
        name: front.name,
        description: front.description,
        body: parsed.content.trim().to_string(),
    })
}

/// List embedded template paths under a prefix (e.g. `agents/`).
pub fn list_templates(prefix: &str) -> Vec<String> {
    PromptAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_agent_templates_load() {
        for path in [
            "agents/resource_finder.md",
            "agents/experiment_runner.md",
            "agents/paper_writer.md",
        ] {
            let template = load_template(path).unwrap_or_else(|| panic!("missing {path}"));
            assert!(!template.name.is_empty());
            assert!(!template.body.is_empty());
        }
    }

    #[test]
    fn test_session_templates_carry_placeholders() {
        for path in ["session/raw_cli.md", "session/notebook.md"] {
            let template = load_template(path).unwrap_or_else(|| panic!("missing {path}"));
            assert!(template.body.contains("{{prompt}}"));
            assert!(template.body.contains("{{work_dir}}"));
        }
    }

    #[test]
    fn test_list_templates() {
        let agents = list_templates("agents/");
        assert!(agents.contains(&"agents/resource_finder.md".to_string()));
        assert_eq!(agents.len(), 3);
    }

    #[test]
    fn test_unknown_template_is_none() {
        assert!(load_template("agents/does_not_exist.md").is_none());
    }
}
