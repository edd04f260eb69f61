//! Request pipeline: generate → publish → enable Pages → settle → notify.
//!
//! Steps run strictly in order and each is attempted once, except delivery
//! which the notifier retries internally. [`Pipeline::spawn`] detaches a run
//! from the HTTP request that triggered it; whatever happens afterwards ends
//! up in the log and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{GenerationError, PipelineError};
use crate::generator::ContentGenerator;
use crate::model::{BuildRequest, CompletionNotice, PublishedLocation};
use crate::notifier::Notifier;
use crate::publisher::Publisher;

pub const DEFAULT_PAGES_SETTLE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Fixed wait after enabling Pages, before notifying.
    pub pages_settle: Duration,
    /// Upper bound on a whole run. `None` lets a run take as long as it takes.
    pub deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pages_settle: DEFAULT_PAGES_SETTLE,
            deadline: None,
        }
    }
}

/// Result of a fully successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub location: PublishedLocation,
    pub notice: CompletionNotice,
    pub delivery_attempts: u32,
}

/// Shared, cheaply cloneable pipeline. Holds no per-request state.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn ContentGenerator>,
    publisher: Publisher,
    notifier: Notifier,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        publisher: Publisher,
        notifier: Notifier,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            publisher,
            notifier,
            settings,
        }
    }

    /// Run every step for one request.
    pub async fn run(&self, request: &BuildRequest) -> Result<PipelineReport, PipelineError> {
        let bundle = self
            .generator
            .generate(&request.brief, &request.attachments, &request.checks)
            .await?;
        if let Err(reason) = bundle.validate() {
            return Err(GenerationError::InvalidBundle(reason).into());
        }
        tracing::info!(files = bundle.len(), "Bundle generated");

        let location = self
            .publisher
            .publish(&request.location_name(), &bundle)
            .await?;

        self.publisher.enable_hosting(&location).await?;

        if !self.settings.pages_settle.is_zero() {
            tracing::info!(
                settle_secs = self.settings.pages_settle.as_secs(),
                url = %location.public_url,
                "Waiting for Pages deployment"
            );
            tokio::time::sleep(self.settings.pages_settle).await;
        }

        let notice = CompletionNotice::new(request, &location);
        let delivery = self
            .notifier
            .deliver(&notice, &request.evaluation_url)
            .await?;

        Ok(PipelineReport {
            location,
            notice,
            delivery_attempts: delivery.attempts,
        })
    }

    /// Run under the configured deadline, if any.
    pub async fn run_with_deadline(
        &self,
        request: &BuildRequest,
    ) -> Result<PipelineReport, PipelineError> {
        match self.settings.deadline {
            Some(limit) => tokio::time::timeout(limit, self.run(request))
                .await
                .map_err(|_| PipelineError::DeadlineExceeded(limit))?,
            None => self.run(request).await,
        }
    }

    /// Detach a run. Errors are logged, never returned.
    pub fn spawn(&self, request: BuildRequest) -> JoinHandle<()> {
        let pipeline = self.clone();
        let span = tracing::info_span!(
            "pipeline",
            task = %request.task,
            round = request.round,
            nonce = %request.nonce
        );
        tokio::spawn(
            async move {
                tracing::info!("Pipeline started");
                match pipeline.run_with_deadline(&request).await {
                    Ok(report) => tracing::info!(
                        pages_url = %report.location.public_url,
                        attempts = report.delivery_attempts,
                        "Pipeline complete"
                    ),
                    Err(e) => tracing::error!(stage = e.stage(), error = %e, "Pipeline failed"),
                }
            }
            .instrument(span),
        )
    }
}
