//! pagesmith server.
//!
//! Requires PAGESMITH_SECRET, GITHUB_TOKEN and ANTHROPIC_API_KEY (or the
//! matching flags). Set PAGESMITH_LOG_JSON=1 for JSON logs.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagesmith::config::Config;
use pagesmith::generator::LlmGenerator;
use pagesmith::hosting::GithubClient;
use pagesmith::llm::LlmClient;
use pagesmith::notifier::Notifier;
use pagesmith::pipeline::Pipeline;
use pagesmith::publisher::Publisher;
use pagesmith::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let json_logs = std::env::var("PAGESMITH_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pagesmith=info,tower_http=info"));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::parse();
    if config.secret.is_empty() {
        anyhow::bail!("PAGESMITH_SECRET must not be empty");
    }

    let llm = LlmClient::new(config.anthropic_api_key.clone())
        .with_api_url(&config.anthropic_api_url)
        .with_model(&config.model)
        .with_max_tokens(config.max_tokens);
    let generator = LlmGenerator::new(Arc::new(llm), config.license_holder.clone());
    let hosting = GithubClient::new(config.github_token.clone()).with_api_url(&config.github_api_url);
    let publisher = Publisher::new(Arc::new(hosting)).with_repo_settle(config.repo_settle());
    let notifier = Notifier::new(config.notifier());
    let pipeline = Pipeline::new(Arc::new(generator), publisher, notifier, config.pipeline());

    tracing::info!(
        addr = %config.listen_addr,
        model = %config.model,
        pages_settle_secs = config.pages_settle_secs,
        notify_attempts = config.notify_attempts,
        "Starting pagesmith"
    );

    let state = Arc::new(AppState {
        secret: config.secret.clone(),
        pipeline,
    });
    let app = web::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for ctrl-c, running until killed");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down; in-flight pipelines are abandoned");
        })
        .await?;
    Ok(())
}
