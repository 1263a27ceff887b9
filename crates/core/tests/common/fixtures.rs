//! Test fixtures: sample ideas and fake agent commands.
//!
//! Agent stages are exercised with `sh -c` scripts standing in for the
//! real provider CLIs. Scripts run in the working directory, consume the
//! prompt from stdin like a real agent (`cat > /dev/null`), and signal
//! through exit codes and marker files.

// Each integration-test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use rk_core::config::models::{AppConfig, ProviderOverride};
use rk_protocol::idea_models::{ExpectedOutput, IdeaDocument, IdeaSpec};
use rk_protocol::provider_models::Provider;

/// A complete idea document that passes validation.
pub fn test_idea_doc() -> IdeaDocument {
    IdeaDocument {
        idea: IdeaSpec {
            title: Some("Curriculum ordering effects".to_string()),
            domain: Some("machine_learning".to_string()),
            hypothesis: Some(
                "Ordering training data by difficulty speeds convergence".to_string(),
            ),
            expected_outputs: vec![ExpectedOutput {
                kind: Some("metrics".to_string()),
                format: Some("json".to_string()),
                fields: vec!["accuracy".to_string()],
            }],
            evaluation_criteria: vec!["Convergence speed vs shuffled baseline".to_string()],
            ..Default::default()
        },
    }
}

pub fn test_idea() -> IdeaSpec {
    test_idea_doc().idea
}

/// Configuration whose `claude` provider runs `sh -c <script>` instead of
/// the real CLI, with GitHub integration disabled.
pub fn config_with_script(script: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.github.enabled = false;
    config.providers.insert(
        "claude".to_string(),
        ProviderOverride {
            program: Some("sh".to_string()),
            base_args: Some(vec!["-c".to_string(), script.to_string()]),
            permission_flag: Some(String::new()),
            structured_output_flags: Some(Vec::new()),
            env: None,
        },
    );
    config
}

/// The provider every fixture config overrides.
pub const TEST_PROVIDER: Provider = Provider::Claude;
