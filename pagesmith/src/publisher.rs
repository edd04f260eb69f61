//! Artifact publisher.
//!
//! Creates the repository, gives the backend a moment to finish initializing,
//! then writes the bundle one file at a time in bundle order. Writes are
//! sequential: the contents API rejects concurrent commits to one branch.
//! A failure part-way leaves the earlier files in place.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{HostingError, PublishError};
use crate::hosting::{HostingClient, RepositoryInfo};
use crate::model::{ArtifactBundle, PublishedLocation};

pub const DEFAULT_REPO_SETTLE: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct Publisher {
    hosting: Arc<dyn HostingClient>,
    repo_settle: Duration,
}

impl Publisher {
    pub fn new(hosting: Arc<dyn HostingClient>) -> Self {
        Self {
            hosting,
            repo_settle: DEFAULT_REPO_SETTLE,
        }
    }

    /// Delay between creating the repository and the first write.
    pub fn with_repo_settle(mut self, settle: Duration) -> Self {
        self.repo_settle = settle;
        self
    }

    pub async fn publish(
        &self,
        name: &str,
        bundle: &ArtifactBundle,
    ) -> Result<PublishedLocation, PublishError> {
        if bundle.is_empty() {
            return Err(PublishError::EmptyBundle(name.to_string()));
        }

        let repo = self
            .hosting
            .create_repository(name)
            .await
            .map_err(|source| PublishError::CreateRepository {
                name: name.to_string(),
                source,
            })?;
        tracing::info!(repo = %repo.name, owner = %repo.owner, "Repository created");

        if !self.repo_settle.is_zero() {
            tokio::time::sleep(self.repo_settle).await;
        }

        let mut last_commit = String::new();
        for (index, file) in bundle.files().iter().enumerate() {
            let message = format!("Add {}", file.path);
            last_commit = self
                .hosting
                .write_file(&repo, &file.path, &file.content, &message)
                .await
                .map_err(|source| PublishError::WriteFile {
                    path: file.path.clone(),
                    index,
                    total: bundle.len(),
                    source,
                })?;
            tracing::debug!(repo = %repo.name, path = %file.path, commit = %last_commit, "File written");
        }

        let location = PublishedLocation::new(
            repo.owner,
            repo.name,
            repo.default_branch,
            repo.html_url,
            last_commit,
        );
        tracing::info!(
            repo = %location.repository,
            files = bundle.len(),
            commit = %location.commit_sha,
            "Bundle published"
        );
        Ok(location)
    }

    /// Turn on Pages. "Already enabled" counts as success.
    pub async fn enable_hosting(&self, location: &PublishedLocation) -> Result<(), PublishError> {
        let repo = RepositoryInfo {
            owner: location.owner.clone(),
            name: location.repository.clone(),
            default_branch: location.default_branch.clone(),
            html_url: location.repository_url.clone(),
        };
        match self.hosting.enable_pages(&repo).await {
            Ok(()) => {
                tracing::info!(url = %location.public_url, "Pages enabled");
                Ok(())
            }
            Err(HostingError::Conflict(detail)) => {
                tracing::info!(repo = %location.repository, %detail, "Pages already enabled");
                Ok(())
            }
            Err(source) => Err(PublishError::EnableHosting {
                repository: location.repository.clone(),
                source,
            }),
        }
    }
}
