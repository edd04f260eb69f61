//! Error taxonomy.
//!
//! Only [`AuthorizationError`] and [`IntakeError`] ever reach an HTTP caller.
//! Everything else happens inside a detached pipeline and ends as a log line.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("secret does not match")]
    SecretMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid JSON body: {0}")]
    Body(String),
    #[error("invalid evaluation_url: {0}")]
    EvaluationUrl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service failed: {0}")]
    Service(String),
    #[error("generation service returned empty content")]
    EmptyContent,
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
    #[error("attachment {name}: {reason}")]
    Attachment { name: String, reason: String },
}

/// Failures reported by a hosting backend.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// The resource already exists in the requested state (HTTP 409).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("hosting API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("hosting request failed: {0}")]
    Transport(String),
    #[error("unexpected hosting response: {0}")]
    Response(String),
    #[error("refusing to write {0}")]
    InvalidPath(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("creating repository {name}: {source}")]
    CreateRepository {
        name: String,
        #[source]
        source: HostingError,
    },
    /// Files before `index` were written and stay in place.
    #[error("writing {path} (file {index} of {total}): {source}")]
    WriteFile {
        path: String,
        index: usize,
        total: usize,
        #[source]
        source: HostingError,
    },
    #[error("bundle for {0} is empty")]
    EmptyBundle(String),
    #[error("enabling pages for {repository}: {source}")]
    EnableHosting {
        repository: String,
        #[source]
        source: HostingError,
    },
}

/// The notifier gave up.
#[derive(Debug, thiserror::Error)]
#[error("notification not delivered after {attempts} attempts: {last_error}")]
pub struct DeliveryFailed {
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Delivery(#[from] DeliveryFailed),
    #[error("pipeline exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl PipelineError {
    /// Short stage label for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Generation(_) => "generate",
            PipelineError::Publish(PublishError::EnableHosting { .. }) => "enable_hosting",
            PipelineError::Publish(_) => "publish",
            PipelineError::Delivery(_) => "notify",
            PipelineError::DeadlineExceeded(_) => "deadline",
        }
    }
}
