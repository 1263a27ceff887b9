//! Application configuration models for `.research-kit/config.toml`.
//!
//! Every section has serde defaults, so an empty or missing file yields a
//! fully usable configuration.

use rk_protocol::provider_models::{Provider, ProviderCommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Unified application configuration.
///
/// # Example
///
/// ```toml
/// # .research-kit/config.toml
/// [workspace]
/// parent-dir = "workspace"
/// auto-create = true
///
/// [github]
/// enabled = true
/// org = "my-lab"
///
/// [timeouts]
/// experiment-secs = 10800
///
/// [providers.claude]
/// program = "claude"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub github: GitHubConfig,
    pub timeouts: TimeoutConfig,

    /// Per-provider overrides of the built-in launch table, keyed by
    /// provider name.
    pub providers: HashMap<String, ProviderOverride>,
}

/// Where run workspaces are created and cloned.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkspaceConfig {
    pub parent_dir: PathBuf,
    pub auto_create: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            parent_dir: PathBuf::from("workspace"),
            auto_create: true,
        }
    }
}

/// Hosting-service integration settings.
///
/// The access token itself is never stored here; it comes from the
/// `GITHUB_TOKEN` environment variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitHubConfig {
    pub enabled: bool,

    /// Organization to create repositories under; the personal account is
    /// used when unset.
    pub org: Option<String>,

    /// Create repositories as private.
    pub private: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            org: None,
            private: false,
        }
    }
}

/// Default per-stage wall-clock timeouts, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimeoutConfig {
    pub resource_finder_secs: u64,
    pub experiment_secs: u64,
    pub paper_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            // 45 minutes
            resource_finder_secs: 2700,
            // 3 hours
            experiment_secs: 10800,
            // 1 hour
            paper_secs: 3600,
        }
    }
}

/// Partial override of one provider's launch table.
///
/// Unset fields keep the built-in default; set fields replace it entirely
/// (an empty list clears the corresponding flags).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProviderOverride {
    pub program: Option<String>,
    pub base_args: Option<Vec<String>>,
    pub permission_flag: Option<String>,
    pub structured_output_flags: Option<Vec<String>>,
    pub env: Option<Vec<(String, String)>>,
}

impl AppConfig {
    /// Resolve the launch command for a provider: built-in defaults with
    /// any configured overrides applied.
    pub fn provider_command(&self, provider: Provider) -> ProviderCommand {
        let mut command = ProviderCommand::defaults(provider);
        if let Some(over) = self.providers.get(provider.as_str()) {
            if let Some(program) = &over.program {
                command.program = program.clone();
            }
            if let Some(base_args) = &over.base_args {
                command.base_args = base_args.clone();
            }
            if let Some(flag) = &over.permission_flag {
                command.permission_flag = if flag.is_empty() {
                    None
                } else {
                    Some(flag.clone())
                };
            }
            if let Some(flags) = &over.structured_output_flags {
                command.structured_output_flags = flags.clone();
            }
            if let Some(env) = &over.env {
                command.env = env.clone();
            }
        }
        command
    }
}
