//! CLI entry point: loads a session file, runs it to completion (or until
//! interrupted), and reports the resulting statistics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sequencer_core::builtin_tasks::builtin_task_executor;
use sequencer_core::config::ConfigLoader;
use sequencer_core::context::ExecutionContext;
use sequencer_core::domain::models::event::EventPayload;
use sequencer_core::domain::models::weather::WeatherSnapshot;
use sequencer_core::persistence::FileSequenceStore;
use sequencer_core::ports::clock::SystemClock;
use sequencer_core::ports::device_gateway::MockDeviceGateway;
use sequencer_core::services::executor::TargetExecutor;
use sequencer_core::ExposureSequence;

#[derive(Parser)]
#[command(name = "sequencer", version, about = "Observatory imaging sequence runner")]
struct Cli {
    /// Path to a YAML config file (site location, weather limits, global
    /// policy defaults, logging). Falls back to built-in defaults.
    #[arg(long, global = true, env = "SEQUENCER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a session file and run it to completion.
    Run {
        /// Session file previously written by `saveSequence`.
        session: PathBuf,
        /// Write the final session state back to this path (defaults to
        /// overwriting `session`).
        #[arg(long)]
        save_to: Option<PathBuf>,
    },
    /// Validate a session file (duplicate names, unknown dependencies,
    /// cycles) without running it.
    Validate { session: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load(path).context("failed to load configuration")?,
        None => ConfigLoader::load_defaults().context("failed to load configuration")?,
    };
    let _log_guard = sequencer_core::logging::init(&config.logging)?;

    match cli.command {
        Commands::Run { session, save_to } => run(config, session, save_to).await,
        Commands::Validate { session } => validate(session).await,
    }
}

async fn validate(session: PathBuf) -> Result<()> {
    let store = FileSequenceStore::new();
    let snapshot = sequencer_core::ports::persistence::SequenceStore::load(
        &store,
        session.to_str().context("session path must be valid UTF-8")?,
    )
    .await?;
    println!("session file is valid: {} target(s)", snapshot.targets.len());
    Ok(())
}

async fn run(
    config: sequencer_core::config::AppConfig,
    session: PathBuf,
    save_to: Option<PathBuf>,
) -> Result<()> {
    let device = Arc::new(MockDeviceGateway::new());
    let clock = Arc::new(SystemClock);
    let event_bus = sequencer_core::services::event_bus::EventBus::default();
    let placeholder_weather = WeatherSnapshot {
        sampled_at: chrono::Utc::now(),
        cloud_cover_percent: 0.0,
        wind_speed_kmh: 0.0,
        humidity_percent: 10.0,
        temperature_c: 15.0,
        dew_point_c: 2.0,
        raining: false,
    };

    let context = ExecutionContext::new(
        clock.clone(),
        event_bus.clone(),
        device,
        config.site,
        config.weather_limits,
        placeholder_weather,
        config.global_policy,
    );
    let task_executor = Arc::new(builtin_task_executor(clock));
    let target_executor = Arc::new(TargetExecutor::new(task_executor));
    let store = Arc::new(FileSequenceStore::new());
    let sequence = ExposureSequence::new(context, target_executor, store);

    let session_path = session.to_str().context("session path must be valid UTF-8")?;
    sequence.load(session_path).await.context("failed to load session file")?;

    let mut events = event_bus.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.payload {
                EventPayload::TargetStarted => {
                    println!("target started: {}", event.target_name.unwrap_or_default());
                }
                EventPayload::TargetCompleted => {
                    println!("target completed: {}", event.target_name.unwrap_or_default());
                }
                EventPayload::TargetFailed { message, .. } => {
                    println!(
                        "target failed: {} ({message})",
                        event.target_name.unwrap_or_default()
                    );
                }
                EventPayload::TargetSkipped { reason } => {
                    println!(
                        "target skipped: {} ({reason})",
                        event.target_name.unwrap_or_default()
                    );
                }
                EventPayload::SessionStopped { reason } => {
                    println!("session stopped: {reason}");
                    break;
                }
                _ => {}
            }
        }
    });

    sequence.start().await.context("failed to start session")?;

    tokio::select! {
        _ = watcher => {}
        _ = tokio::signal::ctrl_c() => {
            println!("interrupt received, stopping gracefully");
            sequence.stop().await.context("failed to stop session")?;
        }
    }

    let stats = sequence.execution_stats().await;
    println!(
        "targets: {} completed, {} failed, {} skipped ({:.1}s total exposure)",
        stats.targets_completed,
        stats.targets_failed,
        stats.targets_skipped,
        stats.total_exposure_seconds,
    );

    let save_path = save_to.unwrap_or(session);
    sequence
        .save(save_path.to_str().context("save path must be valid UTF-8")?)
        .await
        .context("failed to save session file")?;
    Ok(())
}
