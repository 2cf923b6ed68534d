//! occupancy-logger: feeds per-frame detection events into the occupancy
//! pipeline and keeps durable copies of the working log.
//!
//! Events are read as JSON lines, one frame per line:
//!
//! ```text
//! {"timestamp":"2026-10-17 12:00:01","detections":[{"label":"person","confidence":0.91}]}
//! {"detections":[{"label":"person","confidence":0.88,"track_id":7}]}
//! ```
//!
//! `timestamp` is optional and defaults to the wall clock at read time.
//! Lines that are not valid JSON or carry an unparsable timestamp are
//! skipped with a warning. On end of input or Ctrl-C, open intervals are
//! closed at the last frame's time and a final replication cycle runs
//! before exit.
//!
//! Events carry no pixels, so the `[annotation]` settings do not apply
//! here.
//!
//! A copy stuck on an unresponsive mount keeps its blocking thread after
//! the replicator has given up on it. Runtime teardown waits at most one
//! `copy_timeout` for such threads and then exits anyway.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use occupancy_log::occupancy::{TIMESTAMP_FORMAT, truncate_to_second};
use occupancy_log::persistence::CopyOutcome;
use occupancy_log::{
    Detection, OccupancyConfig, OccupancyPipeline, Replicator, Timestamp, WorkingLog,
};

#[derive(Parser, Debug)]
#[command(
    name = "occupancy-logger",
    version,
    about = "Log person presence intervals from detection events"
)]
struct Cli {
    /// TOML configuration file (defaults apply when absent)
    #[arg(long, short, default_value = "config.toml", env = "OCCUPANCY_CONFIG")]
    config: PathBuf,

    /// JSON-lines detection events, one frame per line ("-" for stdin)
    #[arg(long, default_value = "-")]
    events: String,
}

#[derive(Debug, Deserialize)]
struct FrameEvent {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    detections: Vec<Detection>,
}

impl FrameEvent {
    fn time(&self) -> Result<Timestamp> {
        match &self.timestamp {
            Some(raw) => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
                .with_context(|| format!("invalid frame timestamp {raw:?}")),
            None => Ok(Local::now().naive_local()),
        }
    }
}

enum StopReason {
    EndOfInput,
    Interrupted,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = OccupancyConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let grace = Duration::from_secs(config.replication.copy_timeout_secs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = runtime.block_on(run(cli, config));
    runtime.shutdown_timeout(grace);
    result
}

async fn run(cli: Cli, config: OccupancyConfig) -> Result<()> {
    let started = truncate_to_second(Local::now().naive_local());

    // Running without a writable log would silently lose intervals.
    let log = WorkingLog::initialize(&config.log.working_path).context("initializing working log")?;
    let mut pipeline = OccupancyPipeline::new(log);

    let replicator_config = config.replicator_config(started);
    tracing::info!(
        working_log = %config.log.working_path.display(),
        snapshot = %replicator_config.snapshot_name,
        primary = %config.replication.primary_dir.display(),
        backup = ?config.replication.backup_dir,
        "occupancy logger starting"
    );
    let replicator = Replicator::new(replicator_config, config.path_resolver()).spawn();

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if cli.events == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&cli.events)
            .await
            .with_context(|| format!("opening events file {}", cli.events))?;
        Box::new(BufReader::new(file))
    };

    let mut last_frame = None;
    let consumed = consume(reader, &mut pipeline, &mut last_frame).await;

    let close_at = last_frame.unwrap_or_else(|| Local::now().naive_local());
    let drained = pipeline.shutdown(close_at);
    let report = replicator.shutdown().await;

    match &report {
        Some(report) => tracing::info!(
            resolved = %report.resolved,
            durable = %describe(&report.durable),
            backup = %describe(&report.backup),
            "final replication cycle"
        ),
        None => tracing::warn!("replicator stopped without completing a cycle"),
    }

    let reason = consumed?;
    drained.context("closing open intervals")?;
    let frames = pipeline.frames_processed();
    match reason {
        StopReason::EndOfInput => tracing::info!(frames, "end of detection events"),
        StopReason::Interrupted => tracing::info!(frames, "interrupted"),
    }
    Ok(())
}

/// Feed every event line into the pipeline until input ends or Ctrl-C.
async fn consume(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    pipeline: &mut OccupancyPipeline,
    last_frame: &mut Option<Timestamp>,
) -> Result<StopReason> {
    let mut lines = reader.lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading detection events")? else {
                    return Ok(StopReason::EndOfInput);
                };
                if line.trim().is_empty() {
                    continue;
                }
                let (now, detections) = match parse_event(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %format!("{e:#}"), "skipping malformed event line");
                        continue;
                    }
                };
                pipeline
                    .observe_detections(&detections, now)
                    .context("recording presence intervals")?;
                *last_frame = Some(now);
            }
            _ = &mut ctrl_c => {
                return Ok(StopReason::Interrupted);
            }
        }
    }
}

fn parse_event(line: &str) -> Result<(Timestamp, Vec<Detection>)> {
    let event: FrameEvent = serde_json::from_str(line).context("invalid event JSON")?;
    Ok((event.time()?, event.detections))
}

fn describe(outcome: &CopyOutcome) -> String {
    match outcome {
        CopyOutcome::Copied { target, bytes } => {
            format!("copied {bytes} bytes to {}", target.display())
        }
        CopyOutcome::Skipped(reason) => format!("skipped ({reason:?})"),
        CopyOutcome::Failed { target, error } => {
            format!("failed for {}: {error}", target.display())
        }
        CopyOutcome::TimedOut { target, timeout } => {
            format!("timed out after {timeout:?} for {}", target.display())
        }
    }
}

fn init_logging() {
    let filter = std::env::var("OCCUPANCY_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
