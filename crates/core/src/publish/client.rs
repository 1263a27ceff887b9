//! Minimal GitHub REST client for repository management.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Base URL of the GitHub REST API.
pub const GITHUB_API: &str = "https://api.github.com";

/// Errors raised by publishing operations.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("hosting API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hosting API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("git {action} failed: {detail}")]
    Git { action: String, detail: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl PublishError {
    /// Connection-level and server-side failures are worth retrying;
    /// everything else (auth, validation, git content issues) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::Api { status, .. } => *status >= 500,
            Self::Io { .. } => true,
            Self::Git { .. } => false,
        }
    }
}

/// Subset of the repository fields the runner needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub html_url: String,
    pub clone_url: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    login: String,
}

/// Authenticated client for creating and looking up repositories, under an
/// organization or the personal account.
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    org: Option<String>,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, org: Option<String>) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("research-kit")
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            org,
        })
    }

    /// Create a repository, tolerating one that already exists.
    ///
    /// GitHub answers 422 when the name is taken; the existing repository
    /// is fetched and reused in that case, matching the restart-friendly
    /// behavior the runner needs.
    pub async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<RepoInfo, PublishError> {
        let url = match &self.org {
            Some(org) => format!("{GITHUB_API}/orgs/{org}/repos"),
            None => format!("{GITHUB_API}/user/repos"),
        };
        let body = serde_json::json!({
            "name": name,
            "description": description,
            "private": private,
            // The initial commit ensures the default branch exists before
            // the workspace is cloned.
            "auto_init": true,
        });

        debug!(name, url = %url, "creating repository");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 422 {
            debug!(name, "repository already exists, reusing it");
            return self.get_repo(name).await;
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<RepoInfo>().await?)
    }

    /// Look up an existing repository by name.
    pub async fn get_repo(&self, name: &str) -> Result<RepoInfo, PublishError> {
        let owner = self.owner_login().await?;
        let url = format!("{GITHUB_API}/repos/{owner}/{name}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<RepoInfo>().await?)
    }

    /// The repository owner: the organization, or the authenticated user.
    async fn owner_login(&self) -> Result<String, PublishError> {
        if let Some(org) = &self.org {
            return Ok(org.clone());
        }
        let response = self
            .http
            .get(format!("{GITHUB_API}/user"))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<UserInfo>().await?.login)
    }
}
