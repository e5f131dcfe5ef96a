//! Reqforge entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — read the environment (`Config::from_env`) and
//!    fail fast when the required API key is missing.
//! 2. **Wire observability** — configure `tracing-subscriber` with an
//!    `EnvFilter` (default `info`) and, optionally, a JSON formatter. All
//!    `tracing` events emitted by every crate in the workspace flow through
//!    this subscriber.
//! 3. **Construct infrastructure** — create the concrete adapters
//!    (`FsFileReader`, `AnthropicProvider`) and assemble the
//!    [`stages::AnalysisRunner`]; an invalid stage set aborts startup here.
//! 4. **Run the dispatcher** — hand the runner to [`listener::JobDispatcher`]
//!    and block on its control loop until the broker connection fails.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fsio::FsFileReader;
use listener::{BrokerConfig, JobDispatcher};
use llm::AnthropicProvider;
use stages::AnalysisRunner;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_json);

    info!(
        input_queue = %config.input_queue,
        output_queue = %config.output_queue,
        model = %config.anthropic_model,
        "starting reqforge"
    );

    let provider = AnthropicProvider::new(&config.anthropic_api_key, &config.anthropic_model)
        .context("failed to construct the LLM client")?;
    let runner = AnalysisRunner::new(
        Arc::new(FsFileReader::new()),
        Arc::new(provider),
        &config.templates_dir,
        &config.output_dir,
    )
    .context("failed to assemble the analysis pipeline")?;

    let dispatcher = JobDispatcher::new(
        BrokerConfig {
            uri: config.amqp_addr.clone(),
            input_queue: config.input_queue.clone(),
            output_queue: config.output_queue.clone(),
        },
        Arc::new(runner),
    );
    dispatcher
        .run()
        .await
        .context("job dispatcher terminated")?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
