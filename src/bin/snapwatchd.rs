//! snapwatchd - camera monitoring daemon
//!
//! This daemon:
//! 1. Loads the camera list and delivery credentials from TOML + env
//! 2. Spawns one watch loop per enabled camera
//! 3. Shares a single adaptive threshold tracker across all loops
//! 4. Delivers annotated alert snapshots to Telegram
//! 5. Joins all workers on ctrl-c for a clean shutdown

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use snapwatch::{
    CameraWatcher, SnapshotConfig, SnapshotSource, TelegramNotifier, ThresholdTracker,
    WatchConfig,
};

#[derive(Parser, Debug)]
#[command(name = "snapwatchd", version, about = "adaptive snapshot-polling camera monitor")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SNAPWATCH_CONFIG", default_value = "snapwatch.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = WatchConfig::load(&args.config)?;

    let tracker = Arc::new(ThresholdTracker::new(
        cfg.detection.history_cap,
        cfg.detection.min_events,
        cfg.detection.multiplier,
    ));
    let notifier = Arc::new(TelegramNotifier::new(cfg.telegram.clone()));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("install ctrl-c handler")?;
    }

    let enabled = cfg.cameras.iter().filter(|camera| camera.enabled).count();
    log::info!(
        "snapwatchd starting: {} cameras configured, {} enabled",
        cfg.cameras.len(),
        enabled
    );

    let mut workers = Vec::new();
    for camera in cfg.cameras.clone() {
        let source = SnapshotSource::new(SnapshotConfig {
            url: camera.snapshot_url.clone(),
            timeout: cfg.detection.fetch_timeout,
        })
        .with_context(|| format!("camera '{}': snapshot source", camera.name))?;

        let name = camera.name.clone();
        let mut watcher = CameraWatcher::new(
            camera,
            cfg.detection.clone(),
            source,
            notifier.clone(),
            tracker.clone(),
        );
        let shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(format!("watch-{}", name))
            .spawn(move || watcher.run(&shutdown))
            .with_context(|| format!("spawn worker for camera '{}'", name))?;
        workers.push((name, handle));
    }

    for (name, handle) in workers {
        if handle.join().is_err() {
            log::error!("camera {}: worker panicked", name);
        }
    }
    log::info!("snapwatchd stopped");
    Ok(())
}
