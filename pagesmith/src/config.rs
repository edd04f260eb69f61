//! Service configuration. Every flag can also come from the environment.

use std::time::Duration;

use clap::Parser;

use crate::notifier::NotifierConfig;
use crate::pipeline::PipelineSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "pagesmith", about = "Generate, publish and report static apps")]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "PAGESMITH_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Shared secret every build request must carry
    #[arg(long, env = "PAGESMITH_SECRET", hide_env_values = true)]
    pub secret: String,

    /// GitHub token with repo and pages scope
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = crate::hosting::DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: String,

    /// Anthropic API base URL
    #[arg(long, env = "ANTHROPIC_API_URL", default_value = crate::llm::DEFAULT_API_URL)]
    pub anthropic_api_url: String,

    /// Claude model to use
    #[arg(long, env = "PAGESMITH_MODEL", default_value = crate::llm::DEFAULT_MODEL)]
    pub model: String,

    /// Upper bound on tokens in one generation reply
    #[arg(long, env = "PAGESMITH_MAX_TOKENS", default_value_t = crate::llm::DEFAULT_MAX_TOKENS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tokens: u32,

    /// Name on the generated LICENSE
    #[arg(long, env = "PAGESMITH_LICENSE_HOLDER", default_value = "pagesmith")]
    pub license_holder: String,

    /// Seconds to wait after enabling Pages before notifying
    #[arg(long, default_value_t = 30)]
    pub pages_settle_secs: u64,

    /// Seconds to wait after creating a repository before writing files
    #[arg(long, default_value_t = 3)]
    pub repo_settle_secs: u64,

    /// Notification attempts before giving up
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub notify_attempts: u32,

    /// Delay before the first notification retry, doubled after each failure
    #[arg(long, default_value_t = 1000)]
    pub notify_initial_delay_ms: u64,

    /// Per-attempt notification timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub notify_timeout_secs: u64,

    /// Abort a pipeline that runs longer than this (seconds). Unbounded if unset.
    #[arg(long, env = "PAGESMITH_PIPELINE_TIMEOUT")]
    pub pipeline_timeout_secs: Option<u64>,
}

impl Config {
    pub fn notifier(&self) -> NotifierConfig {
        NotifierConfig {
            max_attempts: self.notify_attempts,
            initial_delay: Duration::from_millis(self.notify_initial_delay_ms),
            attempt_timeout: Duration::from_secs(self.notify_timeout_secs),
        }
    }

    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            pages_settle: Duration::from_secs(self.pages_settle_secs),
            deadline: self.pipeline_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn repo_settle(&self) -> Duration {
        Duration::from_secs(self.repo_settle_secs)
    }
}
