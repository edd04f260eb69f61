//! Domain types shared by every pipeline stage.
//!
//! A [`BuildRequest`] is accepted once and never mutated. The generator turns
//! it into an [`ArtifactBundle`], the publisher turns the bundle into a
//! [`PublishedLocation`], and the two together produce the
//! [`CompletionNotice`] sent back to the caller.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthorizationError, IntakeError};

/// File every bundle must contain; GitHub Pages serves it at the site root.
pub const ENTRY_POINT: &str = "index.html";

/// A named inline attachment (`data:` URI) supplied with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// One unit of work, as accepted by intake.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Requester identity, echoed back in the notice.
    pub email: String,
    pub task: String,
    pub round: u32,
    /// Opaque correlation token. Never interpreted.
    pub nonce: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub attachments: Vec<Attachment>,
    /// Where the completion notice is delivered.
    pub evaluation_url: Url,
}

impl BuildRequest {
    /// Deterministic repository name for this task and round.
    pub fn location_name(&self) -> String {
        let raw = format!("{}-round{}", self.task, self.round);
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }
}

/// JSON body accepted by the intake endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPayload {
    pub email: String,
    pub secret: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl TaskPayload {
    /// Check the shared secret.
    pub fn authorize(&self, expected: &str) -> Result<(), AuthorizationError> {
        if expected.is_empty() || !constant_time_eq(self.secret.as_bytes(), expected.as_bytes()) {
            return Err(AuthorizationError::SecretMismatch);
        }
        Ok(())
    }

    /// Drop the secret and validate the callback URL.
    pub fn into_request(self) -> Result<BuildRequest, IntakeError> {
        let evaluation_url = Url::parse(&self.evaluation_url)
            .map_err(|e| IntakeError::EvaluationUrl(format!("{}: {e}", self.evaluation_url)))?;
        if !matches!(evaluation_url.scheme(), "http" | "https") {
            return Err(IntakeError::EvaluationUrl(format!(
                "unsupported scheme {}",
                evaluation_url.scheme()
            )));
        }
        Ok(BuildRequest {
            email: self.email,
            task: self.task,
            round: self.round,
            nonce: self.nonce,
            brief: self.brief,
            checks: self.checks,
            attachments: self.attachments,
            evaluation_url,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    bool::from(a.ct_eq(b))
}

/// A bundle path must be relative and stay inside the repository: no empty,
/// `.` or `..` segments, no backslashes, no control characters.
pub fn check_file_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty file name".to_string());
    }
    if path.contains('\\') || path.chars().any(char::is_control) {
        return Err(format!("{path:?} contains a forbidden character"));
    }
    for segment in path.split('/') {
        if matches!(segment, "" | "." | "..") {
            return Err(format!("{path:?} is not a plain relative path"));
        }
    }
    Ok(())
}

/// A single file in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub path: String,
    pub content: Vec<u8>,
}

/// Insertion-ordered set of named files produced for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactBundle {
    files: Vec<BundleFile>,
}

impl ArtifactBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. An existing path keeps its position and gets the new content.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        let content = content.into();
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.content = content,
            None => self.files.push(BundleFile { path, content }),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_slice())
    }

    pub fn files(&self) -> &[BundleFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every path must be a plain relative path, and the entry point must
    /// exist and hold something other than whitespace.
    pub fn validate(&self) -> Result<(), String> {
        for file in &self.files {
            check_file_path(&file.path)?;
        }
        match self.get(ENTRY_POINT) {
            Some(content) if content.iter().any(|b| !b.is_ascii_whitespace()) => Ok(()),
            Some(_) => Err(format!("{ENTRY_POINT} is empty")),
            None => Err(format!("bundle has no {ENTRY_POINT}")),
        }
    }
}

/// Where a bundle ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLocation {
    pub owner: String,
    pub repository: String,
    pub default_branch: String,
    pub repository_url: String,
    /// Commit created by the last file write.
    pub commit_sha: String,
    pub public_url: String,
}

impl PublishedLocation {
    pub fn new(
        owner: String,
        repository: String,
        default_branch: String,
        repository_url: String,
        commit_sha: String,
    ) -> Self {
        let public_url = pages_url(&owner, &repository);
        Self {
            owner,
            repository,
            default_branch,
            repository_url,
            commit_sha,
            public_url,
        }
    }
}

/// Public GitHub Pages URL for a repository. Never read back from the API.
pub fn pages_url(owner: &str, repository: &str) -> String {
    format!("https://{owner}.github.io/{repository}/")
}

/// Body POSTed to the evaluation endpoint once a pipeline succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl CompletionNotice {
    pub fn new(request: &BuildRequest, location: &PublishedLocation) -> Self {
        Self {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: location.repository_url.clone(),
            commit_sha: location.commit_sha.clone(),
            pages_url: location.public_url.clone(),
        }
    }
}
