//! Loopback runner: captures from one audio device and plays the same
//! samples out of another, then prints per-block statistics as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use audioblock_engine::DeviceBackend;
use audioblock_engine::clock::MonotonicClock;
use clap::Parser;
use tokio::signal;
use tracing::info;

mod config;
mod logging;
mod loopback;

use config::{LoopbackConfig, Overrides};
use loopback::Loopback;

/// Command-line arguments for audioblock
#[derive(Parser, Debug)]
#[command(name = "audioblock")]
#[command(about = "Loop an audio capture device into a playback device")]
#[command(version)]
struct Args {
    /// TOML file with [capture], [playback] and [runner] tables
    #[arg(short, long, env = "AUDIOBLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long, value_name = "SECS")]
    duration: Option<f64>,

    /// Print the device table as JSON and exit
    #[arg(long)]
    list_devices: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[cfg(target_os = "linux")]
fn open_backend() -> Result<Arc<dyn DeviceBackend>> {
    let backend = audioblock_engine::hw::alsa::AlsaBackend::new()
        .context("Failed to enumerate ALSA devices")?;
    Ok(Arc::new(backend))
}

#[cfg(not(target_os = "linux"))]
fn open_backend() -> Result<Arc<dyn DeviceBackend>> {
    anyhow::bail!("no audio backend for this platform")
}

fn list_devices(backend: &dyn DeviceBackend) -> Result<()> {
    let devices: Vec<_> = (0..backend.device_count())
        .filter_map(|i| backend.device_info(audioblock_engine::DeviceHandle(i)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let backend = open_backend()?;
    if args.list_devices {
        return list_devices(backend.as_ref());
    }

    let mut config = LoopbackConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides);
    config.validate()?;
    let duration = args
        .duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("Invalid --duration")?;

    info!(
        "Looping '{}' into '{}' ({} Hz)",
        config.capture.selector(),
        config.playback.selector(),
        config.capture.sample_rate
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut worker = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || {
            let mut lb = Loopback::new(backend, &config, MonotonicClock)?;
            lb.run(&stop, duration)
        }
    });

    let joined = tokio::select! {
        joined = &mut worker => joined,
        _ = shutdown_signal() => {
            stop.store(true, Ordering::Relaxed);
            worker.await
        }
    };
    let report = joined.context("Loopback worker panicked")??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
