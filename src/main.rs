//! OPC Recorder - Main Entry Point
//!
//! Connects to a server, browses it, then runs the configured recording
//! scenarios headlessly until every one has finished.

use anyhow::{bail, Context, Result};
use clap::Parser;
use opc_recorder::{
    app::RecorderApp,
    backend::SimulatedServer,
    config::{default_config_path, AppConfig},
    recording::{ScenarioEvent, SchedulerWorker, SystemClock, DEFAULT_TICK},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Server URL, overrides the configured one
    #[arg(long)]
    url: Option<String>,
    /// Serve the built-in demo plant instead of a remote server
    #[arg(long)]
    simulate: bool,
    /// Also write daily-rotated logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_deref())?;

    tracing::info!("Starting OPC Recorder");

    let config_path = args.config.clone().or_else(default_config_path);
    let config = match (&args.config, &config_path) {
        (Some(path), _) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        (None, Some(path)) if path.exists() => {
            tracing::info!("Using configuration {:?}", path);
            AppConfig::load_or_default(path)
        }
        _ => AppConfig::default(),
    };

    if !args.simulate {
        bail!("No server transport is built in; run with --simulate to use the demo plant");
    }
    let server = SimulatedServer::demo().context("Failed to build the demo plant")?;

    let url = args.url.unwrap_or_else(|| config.server.url.clone());
    let mut app = RecorderApp::new(config, Arc::new(server), Arc::new(SystemClock));

    let browse = app.connect_and_browse(&url)?;
    println!("{}", browse.tree.render());
    tracing::info!(
        "Found {} directories and {} variables",
        browse.directories.len(),
        browse.variables.len()
    );

    if let Some(path) = &config_path {
        if let Err(e) = app.save_config(path) {
            tracing::warn!("Failed to save configuration {:?}: {}", path, e);
        }
    }

    let scenarios = app.create_configured_scenarios()?;
    if scenarios.is_empty() {
        tracing::info!("No scenarios configured, nothing to record");
        app.shutdown();
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let worker = SchedulerWorker::new(app.registry().handles(), running.clone(), DEFAULT_TICK)
        .spawn()
        .context("Failed to start the scheduler thread")?;

    let started = app.start_all();
    tracing::info!("{} of {} scenario(s) recording", started, scenarios.len());

    let events = app.registry().events();
    while app.any_recording() {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
            report(&event);
        }
    }
    for event in events.try_iter() {
        report(&event);
    }

    running.store(false, Ordering::SeqCst);
    if worker.join().is_err() {
        tracing::error!("Scheduler thread panicked");
    }

    app.shutdown();
    Ok(())
}

fn report(event: &ScenarioEvent) {
    match event {
        ScenarioEvent::RowRecorded { scenario, sample } => {
            tracing::debug!("[{}] sample {}", scenario, sample);
        }
        ScenarioEvent::RecordingStopped {
            scenario,
            reason,
            rows,
        } => {
            tracing::info!("[{}] stopped ({:?}) with {} row(s)", scenario, reason, rows);
        }
        ScenarioEvent::AutoSaved { scenario, path } => {
            println!("{}: saved {}", scenario, path.display());
        }
        ScenarioEvent::AutoSaveFailed { scenario, error } => {
            tracing::error!("[{}] auto-save failed: {}", scenario, error);
        }
        ScenarioEvent::RecordingStarted { .. } | ScenarioEvent::LiveUpdated { .. } => {}
    }
}

/// Console logging plus an optional rolling file
fn init_logging(
    log_dir: Option<&std::path::Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,opc_recorder=debug"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "opc-recorder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}
