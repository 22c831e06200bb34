//! Switchboard trace replay
//!
//! Feeds a newline-delimited JSON trace of actions through the call runtime
//! and prints every published snapshot as one JSON line on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use switchboard::config::CallConfig;
use switchboard::db::Database;
use switchboard::engine::DryRunEngine;
use switchboard::runtime::{
    LoggingDeviceControls, LoggingTransport, ProductionRuntime, RuntimeError, RuntimeEvent,
    SqliteCallLog,
};
use switchboard::state_machine::{Action, UuidDirectory};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    trace: Option<PathBuf>,
    no_db: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        trace: None,
        no_db: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--no-db" => args.no_db = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
            path if args.trace.is_none() => args.trace = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument: {extra}")),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout carries snapshots
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchboard=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = parse_args().map_err(|e| format!("{e}\nusage: switchboard [--no-db] [trace.jsonl]"))?;
    let config = CallConfig::from_env();

    let db = if args.no_db {
        tracing::info!("Using in-memory call history");
        Database::open_in_memory()?
    } else {
        tracing::info!(path = %config.db_path.display(), "Opening database");
        Database::open(&config.db_path)?
    };

    let (runtime, handle) = ProductionRuntime::new(
        &config,
        Box::new(DryRunEngine::new()),
        Arc::new(UuidDirectory),
        LoggingTransport,
        SqliteCallLog::new(db.clone()),
        LoggingDeviceControls,
    );

    let printer = tokio::spawn(print_snapshots(handle.subscribe()));
    let runtime_task = tokio::spawn(runtime.run());

    let replayed = match &args.trace {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            replay(BufReader::new(file), &handle).await?
        }
        None => replay(BufReader::new(tokio::io::stdin()), &handle).await?,
    };
    tracing::info!(actions = replayed, "Trace replay finished");

    // Wait for queued actions and their effects before stopping
    if let Err(e) = handle.flush().await {
        tracing::debug!(error = %e, "Runtime stopped before flush");
    }
    handle.shutdown();
    let outcome = runtime_task.await?;
    drop(handle);
    printer.await?;

    log_history(&db)?;
    outcome?;
    Ok(())
}

fn log_history(db: &Database) -> Result<(), switchboard::db::DbError> {
    let calls = db.list_calls()?;
    for call in &calls {
        tracing::info!(
            peer = %call.peer,
            kind = %call.kind,
            had_video = call.had_video,
            at = %call.occurred_at,
            "call history"
        );
    }
    tracing::info!(count = calls.len(), "call history loaded");
    Ok(())
}

/// Send each decodable trace line to the runtime; returns how many were sent
async fn replay<R>(
    reader: R,
    handle: &switchboard::runtime::RuntimeHandle,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let action: Action = match serde_json::from_str(line) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed trace line");
                continue;
            }
        };

        match handle.send(action).await {
            Ok(()) => sent += 1,
            Err(RuntimeError::Stopped) => {
                tracing::warn!(line = line_no, "Runtime stopped, abandoning trace");
                break;
            }
            Err(e) => return Err(std::io::Error::other(e.to_string())),
        }
    }

    Ok(sent)
}

async fn print_snapshots(mut events: broadcast::Receiver<RuntimeEvent>) {
    loop {
        match events.recv().await {
            Ok(RuntimeEvent::Snapshot(snapshot)) => match serde_json::to_string(&*snapshot) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "Failed to encode snapshot"),
            },
            Ok(RuntimeEvent::Fatal { message }) => {
                tracing::error!(%message, "Call runtime failed");
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Snapshot printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
