//! BrainFrame command-line client.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags with environment fallbacks
//!    (`BRAINFRAME_URL`, `BRAINFRAME_USERNAME`, `BRAINFRAME_PASSWORD`) become a
//!    [`client::ClientConfig`].
//! 2. **Wire observability**: `tracing-subscriber` to stderr, plus OTLP export
//!    when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct the client** and run one subcommand against it.

mod commands;
mod telemetry;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use client::{BrainFrameApi, ClientConfig};

use crate::commands::Command;
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "brainframe", version, about = "Talk to a BrainFrame server")]
struct Cli {
    /// Base URL of the BrainFrame server.
    #[arg(long, env = "BRAINFRAME_URL", default_value = "http://localhost", global = true)]
    url: String,

    #[arg(long, env = "BRAINFRAME_USERNAME", global = true, requires = "password")]
    username: Option<String>,

    #[arg(long, env = "BRAINFRAME_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Timeout for ordinary requests, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 30, global = true)]
    request_timeout: u64,

    #[arg(long, value_enum, env = "BRAINFRAME_LOG_FORMAT", default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url.clone());
        config.default_timeout = Duration::from_secs(self.request_timeout);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username.clone(), password.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_format)?;

    let api = BrainFrameApi::new(cli.client_config()).context("invalid client configuration")?;
    let result = commands::run(cli.command, &api).await;
    api.close().await;
    result
}
