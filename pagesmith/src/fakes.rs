//! In-memory collaborators for tests.
//!
//! `RecordingHost` records every hosting call in order and can be told to
//! fail at a chosen step. `ScriptedGenerator` returns a fixed bundle or a
//! fixed error and counts invocations.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{GenerationError, HostingError};
use crate::generator::ContentGenerator;
use crate::hosting::{HostingClient, RepositoryInfo};
use crate::model::{ArtifactBundle, Attachment};

/// One observed hosting call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create(String),
    /// (path, commit message)
    Write(String, String),
    EnablePages(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagesMode {
    Ok,
    AlreadyEnabled,
    Fail,
}

/// Hosting backend that keeps everything in memory.
#[derive(Debug)]
pub struct RecordingHost {
    owner: String,
    calls: Mutex<Vec<HostCall>>,
    files: Mutex<Vec<(String, Vec<u8>)>>,
    fail_create: bool,
    fail_write_at: Option<usize>,
    pages: PagesMode,
}

impl RecordingHost {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            calls: Mutex::new(Vec::new()),
            files: Mutex::new(Vec::new()),
            fail_create: false,
            fail_write_at: None,
            pages: PagesMode::Ok,
        }
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Fail the write with this zero-based index.
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    pub fn pages_already_enabled(mut self) -> Self {
        self.pages = PagesMode::AlreadyEnabled;
        self
    }

    pub fn fail_pages(mut self) -> Self {
        self.pages = PagesMode::Fail;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Files that were successfully written, in write order.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl HostingClient for RecordingHost {
    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo, HostingError> {
        self.record(HostCall::Create(name.to_string()));
        if self.fail_create {
            return Err(HostingError::Api {
                status: 422,
                body: "name already exists on this account".to_string(),
            });
        }
        Ok(RepositoryInfo {
            owner: self.owner.clone(),
            name: name.to_string(),
            default_branch: "main".to_string(),
            html_url: format!("https://github.com/{}/{name}", self.owner),
        })
    }

    async fn write_file(
        &self,
        _repo: &RepositoryInfo,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, HostingError> {
        let index = self.files.lock().unwrap().len();
        self.record(HostCall::Write(path.to_string(), message.to_string()));
        if self.fail_write_at == Some(index) {
            return Err(HostingError::Api {
                status: 409,
                body: "is at a different sha".to_string(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_vec()));
        Ok(format!("commit-{}", index + 1))
    }

    async fn enable_pages(&self, repo: &RepositoryInfo) -> Result<(), HostingError> {
        self.record(HostCall::EnablePages(repo.name.clone()));
        match self.pages {
            PagesMode::Ok => Ok(()),
            PagesMode::AlreadyEnabled => Err(HostingError::Conflict(
                "GitHub Pages is already enabled.".to_string(),
            )),
            PagesMode::Fail => Err(HostingError::Transport("connection reset".to_string())),
        }
    }
}

/// Generator with a canned answer.
#[derive(Debug)]
pub struct ScriptedGenerator {
    outcome: Result<ArtifactBundle, String>,
    calls: AtomicUsize,
    seen_checks: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn returning(bundle: ArtifactBundle) -> Self {
        Self {
            outcome: Ok(bundle),
            calls: AtomicUsize::new(0),
            seen_checks: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            seen_checks: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_checks(&self) -> Vec<Vec<String>> {
        self.seen_checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _brief: &str,
        _attachments: &[Attachment],
        checks: &[String],
    ) -> Result<ArtifactBundle, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_checks.lock().unwrap().push(checks.to_vec());
        match &self.outcome {
            Ok(bundle) => Ok(bundle.clone()),
            Err(message) => Err(GenerationError::Service(message.clone())),
        }
    }
}

/// Generator that never finishes. Useful for showing that intake does not
/// wait on the pipeline.
#[derive(Debug, Default)]
pub struct StalledGenerator {
    calls: AtomicUsize,
}

impl StalledGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for StalledGenerator {
    async fn generate(
        &self,
        _brief: &str,
        _attachments: &[Attachment],
        _checks: &[String],
    ) -> Result<ArtifactBundle, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
