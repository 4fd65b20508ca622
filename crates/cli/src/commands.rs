//! Subcommand implementations. Results go to stdout as JSON; diagnostics go
//! through `tracing` to stderr.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::Subcommand;
use client::{BrainFrameApi, PremisesId, ReceiverState, StreamId, ZoneStatusFrame};
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the server version.
    Version,

    /// Block until the server accepts requests.
    Wait {
        /// Give up after this many seconds. Waits indefinitely if omitted.
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<f64>,
    },

    /// List stream configurations.
    Streams {
        /// Only streams belonging to this premises.
        #[arg(long)]
        premises_id: Option<u64>,
    },

    /// Print the latest status of every zone.
    Statuses,

    /// Follow the live zone-status feed until interrupted.
    Watch {
        /// Only print statuses for this stream.
        #[arg(long)]
        stream_id: Option<u64>,
    },
}

pub async fn run(command: Command, api: &BrainFrameApi) -> anyhow::Result<()> {
    match command {
        Command::Version => {
            let version = api.version().await.context("could not read the server version")?;
            println!("{version}");
        }
        Command::Wait { timeout } => {
            let timeout = timeout.map(seconds).transpose()?;
            api.wait_for_server_initialization(timeout).await?;
            info!("server is ready");
        }
        Command::Streams { premises_id } => {
            let streams = api
                .get_stream_configurations(premises_id.map(PremisesId::new))
                .await
                .context("could not list streams")?;
            println!("{}", serde_json::to_string_pretty(&streams)?);
        }
        Command::Statuses => {
            let frame = api
                .get_latest_zone_statuses()
                .await
                .context("could not read zone statuses")?;
            println!("{}", serde_json::to_string_pretty(&frame)?);
        }
        Command::Watch { stream_id } => watch(api, stream_id.map(StreamId::new)).await?,
    }
    Ok(())
}

async fn watch(api: &BrainFrameApi, only: Option<StreamId>) -> anyhow::Result<()> {
    let receiver = api.get_status_receiver();
    receiver.add_listener(move |frame| {
        if let Some(line) = render(frame, only) {
            println!("{line}");
        }
    });

    let mut states = receiver.watch_state();
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => {
            interrupted.context("could not listen for Ctrl-C")?;
            info!("interrupted; closing the status feed");
        }
        _ = states.wait_for(|state| *state == ReceiverState::Stopped) => {}
    }

    receiver.close().await;
    if let Some(failure) = receiver.failure() {
        bail!("status feed stopped: {failure}");
    }
    Ok(())
}

/// One output line for `frame`, or `None` when the filter leaves nothing.
fn render(frame: &ZoneStatusFrame, only: Option<StreamId>) -> Option<String> {
    let value = match only {
        Some(stream_id) => {
            let statuses = frame.get(&stream_id)?;
            serde_json::to_value(statuses).ok()?
        }
        None => serde_json::to_value(frame).ok()?,
    };
    Some(value.to_string())
}

fn seconds(raw: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(raw).with_context(|| format!("'{raw}' is not a valid number of seconds"))
}
