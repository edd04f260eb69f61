//! Completion notifier with bounded exponential backoff.
//!
//! A notice is POSTed as JSON. Any 2xx status is success and the body is
//! never read. Transport errors, timeouts and non-2xx statuses are retried
//! after 1s, 2s, 4s, ... until `max_attempts` is reached.

use std::time::Duration;

use url::Url;

use crate::error::DeliveryFailed;
use crate::model::CompletionNotice;

/// Retry policy for one delivery.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl NotifierConfig {
    /// Sleeps taken between attempts when every attempt fails.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut state = RetryState::new(self);
        let mut out = Vec::new();
        while let Some(delay) = state.next_delay(self) {
            out.push(delay);
        }
        out
    }
}

/// Successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub attempts: u32,
}

/// Per-call retry bookkeeping. Never outlives one `deliver`.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    delay: Duration,
}

impl RetryState {
    fn new(config: &NotifierConfig) -> Self {
        Self {
            attempt: 1,
            delay: config.initial_delay,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    fn next_delay(&mut self, config: &NotifierConfig) -> Option<Duration> {
        if self.attempt >= config.max_attempts {
            return None;
        }
        let delay = self.delay;
        self.attempt += 1;
        self.delay = self.delay.saturating_mul(2);
        Some(delay)
    }
}

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn deliver(
        &self,
        notice: &CompletionNotice,
        endpoint: &Url,
    ) -> Result<Delivery, DeliveryFailed> {
        let mut state = RetryState::new(&self.config);

        loop {
            let last_error = match self.attempt(notice, endpoint).await {
                Ok(()) => {
                    tracing::info!(
                        task = %notice.task,
                        round = notice.round,
                        attempt = state.attempt,
                        "Completion notice delivered"
                    );
                    return Ok(Delivery {
                        attempts: state.attempt,
                    });
                }
                Err(e) => e,
            };

            let attempt = state.attempt;
            match state.next_delay(&self.config) {
                Some(delay) => {
                    tracing::warn!(
                        task = %notice.task,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Notification attempt failed: {last_error}"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(DeliveryFailed {
                        attempts: attempt,
                        last_error,
                    });
                }
            }
        }
    }

    async fn attempt(&self, notice: &CompletionNotice, endpoint: &Url) -> Result<(), String> {
        let resp = self
            .http
            .post(endpoint.clone())
            .header("content-type", "application/json")
            .timeout(self.config.attempt_timeout)
            .json(notice)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("timed out after {:?}", self.config.attempt_timeout)
                } else {
                    e.to_string()
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("endpoint returned {status}"))
        }
    }
}
