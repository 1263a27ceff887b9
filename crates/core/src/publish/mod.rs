//! Hosting-service publishing: repository creation, cloning and pushes.

pub mod client;
pub mod git;
pub mod publisher;

pub use client::{GitHubClient, PublishError, RepoInfo};
pub use git::Git;
pub use publisher::GitHubPublisher;
