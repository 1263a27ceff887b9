//! Publisher tying the hosting API client and the git wrapper together.

use crate::config::AppConfig;
use crate::publish::client::{GitHubClient, PublishError, RepoInfo};
use crate::publish::git::Git;
use crate::retry::RetryPolicy;
use crate::security;
use chrono::Utc;
use rk_protocol::provider_models::Provider;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Handles workspace repositories for research runs.
///
/// Repository creation is retried (transient failures only); pushes and
/// pulls are single attempts whose failures the caller treats as warnings.
pub struct GitHubPublisher {
    client: GitHubClient,
    token: String,
    workspace_dir: PathBuf,
    private: bool,
}

impl GitHubPublisher {
    /// Build a publisher from configuration and the `GITHUB_TOKEN`
    /// environment variable. Returns `None` when integration is disabled
    /// or no token is available.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, PublishError> {
        if !config.github.enabled {
            return Ok(None);
        }
        let Some(token) = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
        else {
            return Ok(None);
        };

        let client = GitHubClient::new(token.clone(), config.github.org.clone())?;
        let workspace_dir = config.workspace.parent_dir.clone();
        if config.workspace.auto_create {
            std::fs::create_dir_all(&workspace_dir).map_err(|source| PublishError::Io {
                context: format!("create workspace dir {}", workspace_dir.display()),
                source,
            })?;
        }

        Ok(Some(Self {
            client,
            token,
            workspace_dir,
            private: config.github.private,
        }))
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Local path of an already-cloned workspace repository, if present.
    pub fn workspace_path(&self, repo_name: &str) -> Option<PathBuf> {
        let path = self.workspace_dir.join(repo_name);
        Git::is_repo(&path).then_some(path)
    }

    /// Create (or reuse) the repository for a research run and return it
    /// along with the local path it should be cloned to.
    pub async fn create_research_repo(
        &self,
        title: &str,
        hypothesis: &str,
        provider: Provider,
        no_hash: bool,
    ) -> Result<(RepoInfo, PathBuf), PublishError> {
        let name = repo_name_for(title, provider, no_hash);
        let description = repo_description(title, hypothesis);

        println!("📦 Creating repository: {name}");
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let info = policy
            .run(PublishError::is_transient, || {
                self.client.create_repo(&name, &description, self.private)
            })
            .await?;

        let local_path = self.workspace_dir.join(&info.name);
        println!("✅ Repository ready: {}", info.html_url);
        Ok((info, local_path))
    }

    /// Clone a repository into the workspace, replacing any stale copy.
    pub async fn clone_repo(&self, info: &RepoInfo, dest: &Path) -> Result<Git, PublishError> {
        if dest.exists() {
            std::fs::remove_dir_all(dest).map_err(|source| PublishError::Io {
                context: format!("remove stale checkout {}", dest.display()),
                source,
            })?;
        }
        let auth_url = inject_token(&info.clone_url, &self.token);
        Git::clone_into(&auth_url, dest).await
    }

    /// Sanitize logs, then stage, commit and push the working directory,
    /// retrying transient failures.
    ///
    /// Returns false when there was nothing to publish.
    pub async fn publish(&self, work_dir: &Path, message: &str) -> Result<bool, PublishError> {
        let sanitized = security::sanitize_logs_dir(&work_dir.join("logs"));
        if sanitized > 0 {
            debug!(sanitized, "redacted log files before publishing");
        }
        let git = Git::new(work_dir);
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        policy
            .run(PublishError::is_transient, || git.commit_and_push(message))
            .await
    }

    /// Best-effort pull of the latest remote changes into a workspace.
    pub async fn pull_latest(&self, work_dir: &Path) -> Result<(), PublishError> {
        Git::new(work_dir).pull_latest().await
    }
}

/// Repository name: `<title-slug>-<hash>-<provider>`, or without the hash
/// when the caller guarantees the idea runs only once.
fn repo_name_for(title: &str, provider: Provider, no_hash: bool) -> String {
    let slug = slug(title, 24);
    if no_hash {
        format!("{slug}-{provider}")
    } else {
        let hash = Uuid::new_v4().simple().to_string();
        format!("{slug}-{}-{provider}", &hash[..6])
    }
}

/// Single-line repository description within GitHub's limits.
fn repo_description(title: &str, hypothesis: &str) -> String {
    let base = if hypothesis.is_empty() {
        format!("Autonomous research experiment: {title}")
    } else {
        hypothesis.to_string()
    };
    let stamped = format!(
        "{base} | Generated by research-kit on {}",
        Utc::now().format("%Y-%m-%d")
    );
    // No control characters allowed; collapse all whitespace runs.
    stamped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn slug(text: &str, max_len: usize) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let capped: String = slug.chars().take(max_len).collect();
    capped.trim_end_matches('-').to_string()
}

/// Inject the token into an HTTPS clone URL for authentication.
fn inject_token(clone_url: &str, token: &str) -> String {
    clone_url.replacen("https://", &format!("https://{token}@"), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name_with_and_without_hash() {
        let plain = repo_name_for("Curriculum ordering effects", Provider::Claude, true);
        assert_eq!(plain, "curriculum-ordering-effe-claude");

        let hashed = repo_name_for("Curriculum ordering effects", Provider::Codex, false);
        assert!(hashed.starts_with("curriculum-ordering-effe-"));
        assert!(hashed.ends_with("-codex"));
        assert_ne!(
            repo_name_for("Curriculum ordering effects", Provider::Codex, false),
            hashed
        );
    }

    #[test]
    fn test_repo_description_is_single_line() {
        let description = repo_description("A Title", "Line one\nline two\ttabbed");
        assert!(!description.contains('\n'));
        assert!(!description.contains('\t'));
        assert!(description.contains("Generated by research-kit"));
    }

    #[test]
    fn test_inject_token() {
        assert_eq!(
            inject_token("https://github.com/lab/repo.git", "tok123"),
            "https://tok123@github.com/lab/repo.git"
        );
    }

    #[test]
    fn test_from_config_disabled_or_tokenless() {
        let mut config = AppConfig::default();
        config.github.enabled = false;
        assert!(GitHubPublisher::from_config(&config).unwrap().is_none());
    }
}
