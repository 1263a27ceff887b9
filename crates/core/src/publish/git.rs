//! Small, explicit wrapper around `git` subprocess calls.
//!
//! The runner only needs clone, stage-commit-push and pull, so a thin
//! wrapper over the CLI beats a library binding here; it also inherits the
//! operator's existing git configuration (credentials, signing, proxies).

use crate::publish::client::PublishError;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Clone `url` into `dest` and return a wrapper for the new clone.
    pub async fn clone_into(url: &str, dest: &Path) -> Result<Git, PublishError> {
        let dest_str = dest.display().to_string();
        debug!(dest = %dest_str, "cloning repository");
        run_git(None, &["clone", url, &dest_str]).await?;
        Ok(Git::new(dest))
    }

    /// True when the directory is (inside) a git checkout.
    pub fn is_repo(path: &Path) -> bool {
        path.join(".git").exists()
    }

    /// Stage everything, commit and push.
    ///
    /// Returns false when there was nothing to commit.
    pub async fn commit_and_push(&self, message: &str) -> Result<bool, PublishError> {
        self.run_checked(&["add", "-A"]).await?;

        let status = self.run_checked(&["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            debug!("nothing to commit");
            return Ok(false);
        }

        self.run_checked(&["commit", "-m", message]).await?;
        // `origin HEAD` pushes the current branch whether or not an
        // upstream is configured yet.
        self.run_checked(&["push", "origin", "HEAD"]).await?;
        Ok(true)
    }

    /// Pull the latest changes from the tracked remote branch.
    pub async fn pull_latest(&self) -> Result<(), PublishError> {
        self.run_checked(&["pull"]).await?;
        Ok(())
    }

    /// The `origin` remote URL with any embedded token stripped.
    pub async fn remote_url(&self) -> Result<String, PublishError> {
        let url = self.run_checked(&["remote", "get-url", "origin"]).await?;
        Ok(strip_credentials(url.trim()))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String, PublishError> {
        let output = run_git(Some(&self.workdir), args).await?;
        if !output.status.success() {
            return Err(PublishError::Git {
                action: args.first().map_or_else(String::new, |a| (*a).to_string()),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

async fn run_git(workdir: Option<&Path>, args: &[&str]) -> Result<Output, PublishError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    cmd.output().await.map_err(|source| PublishError::Io {
        context: format!("run git {}", args.first().unwrap_or(&"")),
        source,
    })
}

/// Remove a `token@` credential section from an HTTPS remote URL and drop a
/// trailing `.git`, leaving a displayable browser URL.
fn strip_credentials(url: &str) -> String {
    let without_suffix = url.strip_suffix(".git").unwrap_or(url);
    if let Some(rest) = without_suffix.strip_prefix("https://") {
        if let Some((_credentials, host_path)) = rest.split_once('@') {
            return format!("https://{host_path}");
        }
    }
    without_suffix.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_credentials_removes_token() {
        assert_eq!(
            strip_credentials("https://ghp_secret123@github.com/lab/repo.git"),
            "https://github.com/lab/repo"
        );
    }

    #[test]
    fn test_strip_credentials_plain_url_unchanged() {
        assert_eq!(
            strip_credentials("https://github.com/lab/repo"),
            "https://github.com/lab/repo"
        );
    }

    #[tokio::test]
    async fn test_commit_and_push_in_local_repo() {
        // A file:// "remote" keeps the test offline while exercising the
        // full add/commit/push path.
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("remote.git");
        let remote_str = remote.display().to_string();
        run_git(None, &["init", "--bare", &remote_str]).await.unwrap();

        let checkout = root.path().join("checkout");
        let git = Git::clone_into(&remote_str, &checkout).await.unwrap();
        // Fresh clone of an empty bare repo: identity required for commits.
        git.run_checked(&["config", "user.email", "test@example.com"])
            .await
            .unwrap();
        git.run_checked(&["config", "user.name", "Test"]).await.unwrap();

        std::fs::write(checkout.join("results.md"), "findings\n").unwrap();
        assert!(git.commit_and_push("record results").await.unwrap());

        // Nothing left to commit on the second call.
        assert!(!git.commit_and_push("noop").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_repo() {
        let root = tempfile::tempdir().unwrap();
        assert!(!Git::is_repo(root.path()));
        run_git(Some(root.path()), &["init"]).await.unwrap();
        assert!(Git::is_repo(root.path()));
    }
}
