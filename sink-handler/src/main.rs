//! Upsert sink handler binary.
//!
//! Reads a batch of change events from a file or stdin, applies it to the configured MySQL
//! table and prints the invocation response as JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use sink_config::shared::HandlerConfig;
use sink_telemetry::tracing::init_tracing;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::config::load_handler_config;
use crate::core::handle_events;
use crate::error::{HandlerError, HandlerResult};

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "sink-handler", version, about)]
struct Args {
    /// JSON file holding the event batch. The batch is read from stdin when omitted.
    #[arg(long)]
    event_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> HandlerResult<()> {
    let args = Args::parse();

    let handler_config = load_handler_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(HandlerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args, handler_config))
}

async fn async_main(args: Args, handler_config: HandlerConfig) -> HandlerResult<()> {
    let payload = read_event_batch(args.event_file.as_deref()).await?;
    info!(bytes = payload.len(), "received event batch");

    let response = handle_events(&handler_config.sink, &payload).await;
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}

async fn read_event_batch(event_file: Option<&Path>) -> HandlerResult<Vec<u8>> {
    match event_file {
        Some(path) => Ok(tokio::fs::read(path).await?),
        None => {
            let mut payload = Vec::new();
            tokio::io::stdin().read_to_end(&mut payload).await?;
            Ok(payload)
        }
    }
}
