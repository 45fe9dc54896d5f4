//! Per-camera motion watch loop.
//!
//! One `CameraWatcher` owns one camera's cycle:
//! fetch -> fingerprint -> compare -> localize -> decide -> notify ->
//! update. Each watcher exclusively owns its previous-frame state and
//! cooldown timer; the only shared resource is the threshold tracker.
//!
//! The loop is designed to run forever. Every failure mode is logged
//! and survived: fetch failures back off and retry, fingerprint
//! failures skip the cycle with state retained, dimension mismatches
//! count as "no change", and delivery failures leave both the cooldown
//! timer and the adaptive history untouched so the next qualifying
//! frame retries unthrottled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::bounds::{diff_bounds, Region};
use crate::config::{CameraConfig, DetectionConfig};
use crate::fingerprint::Fingerprint;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::notify::Notifier;
use crate::tracker::ThresholdTracker;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Watch loop state. Cooldown is a gate inside `Watching`, not a
/// separate state.
enum WatchState {
    /// No previous frame captured yet.
    Priming,
    /// Comparing each new frame against the stored baseline.
    Watching(Baseline),
}

struct Baseline {
    frame: Frame,
    fingerprint: Fingerprint,
}

/// What one observed frame did to the watcher.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    /// First frame stored; nothing to compare against yet.
    Primed,
    /// Fingerprinting failed; cycle skipped, state retained.
    FingerprintFailed,
    /// Change at or below the camera's noise floor.
    Noise { change: f64 },
    /// Change did not strictly exceed the active threshold.
    BelowThreshold { change: f64, threshold: f64 },
    /// Threshold exceeded but no localizable changed region.
    NoRegion { change: f64 },
    /// Alert-worthy change suppressed by the cooldown.
    CoolingDown { change: f64 },
    /// Alert delivered; cooldown armed and history fed.
    Alerted { change: f64, region: Region },
    /// Alert produced but not delivered; cooldown and history
    /// deliberately left unchanged.
    DeliveryFailed { change: f64 },
}

/// One camera's watch loop.
pub struct CameraWatcher<S: FrameSource, N: Notifier> {
    camera: CameraConfig,
    tuning: DetectionConfig,
    source: S,
    notifier: N,
    tracker: Arc<ThresholdTracker>,
    state: WatchState,
    last_alert: Option<Instant>,
    cycles: u64,
    alerts_sent: u64,
}

impl<S: FrameSource, N: Notifier> CameraWatcher<S, N> {
    pub fn new(
        camera: CameraConfig,
        tuning: DetectionConfig,
        source: S,
        notifier: N,
        tracker: Arc<ThresholdTracker>,
    ) -> Self {
        Self {
            camera,
            tuning,
            source,
            notifier,
            tracker,
            state: WatchState::Priming,
            last_alert: None,
            cycles: 0,
            alerts_sent: 0,
        }
    }

    /// Run until `shutdown` is set. Returns immediately for a disabled
    /// camera, before any I/O.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        if !self.camera.enabled {
            log::info!("camera {}: disabled, skipping", self.camera.name);
            return;
        }
        log::info!(
            "camera {}: watching {} (threshold {:.1}%, cooldown {}s)",
            self.camera.name,
            self.camera.snapshot_url,
            self.camera.threshold_percent,
            self.camera.cooldown.as_secs()
        );

        let mut last_health = Instant::now();
        while !shutdown.load(Ordering::Relaxed) {
            match self.run_cycle() {
                Some(outcome) => {
                    log::debug!("camera {}: {:?}", self.camera.name, outcome);
                    std::thread::sleep(self.tuning.poll_interval);
                }
                None => std::thread::sleep(self.tuning.fetch_backoff),
            }

            if last_health.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "camera {}: cycles={} alerts={} history={}",
                    self.camera.name,
                    self.cycles,
                    self.alerts_sent,
                    self.tracker.history_len(&self.camera.name)
                );
                last_health = Instant::now();
            }
        }
        log::info!("camera {}: stopped", self.camera.name);
    }

    /// Fetch and observe one frame. Returns `None` on a fetch failure,
    /// which never touches the stored state; the caller backs off and
    /// retries.
    pub fn run_cycle(&mut self) -> Option<CycleOutcome> {
        match self.source.fetch() {
            Ok(frame) => {
                self.cycles += 1;
                Some(self.observe(frame))
            }
            Err(e) => {
                log::warn!(
                    "camera {}: snapshot fetch failed: {:#}",
                    self.camera.name,
                    e
                );
                None
            }
        }
    }

    /// Observe one fetched frame and step the state machine.
    pub fn observe(&mut self, frame: Frame) -> CycleOutcome {
        let fingerprint = match Fingerprint::of(&frame) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                log::warn!(
                    "camera {}: fingerprint failed, skipping cycle: {:#}",
                    self.camera.name,
                    e
                );
                return CycleOutcome::FingerprintFailed;
            }
        };

        match std::mem::replace(&mut self.state, WatchState::Priming) {
            WatchState::Priming => {
                self.state = WatchState::Watching(Baseline { frame, fingerprint });
                CycleOutcome::Primed
            }
            WatchState::Watching(baseline) => {
                let outcome = self.evaluate(&baseline, &frame, fingerprint);
                self.state = WatchState::Watching(Baseline { frame, fingerprint });
                outcome
            }
        }
    }

    fn evaluate(
        &mut self,
        baseline: &Baseline,
        frame: &Frame,
        fingerprint: Fingerprint,
    ) -> CycleOutcome {
        let change = baseline.fingerprint.distance_percent(fingerprint);
        if change <= self.camera.min_threshold_percent {
            return CycleOutcome::Noise { change };
        }

        let threshold = self
            .tracker
            .get(&self.camera.name, self.camera.threshold_percent);

        let region = match diff_bounds(&baseline.frame, frame, self.tuning.channel_delta) {
            Ok(region) => region,
            Err(mismatch) => {
                log::warn!(
                    "camera {}: {}; treating as no change",
                    self.camera.name,
                    mismatch
                );
                Region::EMPTY
            }
        };
        let localized = !region.is_empty() && region.area() >= self.tuning.min_region_area;

        if change <= threshold {
            return CycleOutcome::BelowThreshold { change, threshold };
        }
        if !localized {
            return CycleOutcome::NoRegion { change };
        }
        if !self.cooldown_elapsed() {
            return CycleOutcome::CoolingDown { change };
        }

        match self.deliver(frame, &region, change) {
            Ok(()) => {
                self.last_alert = Some(Instant::now());
                self.tracker.add(&self.camera.name, change);
                self.alerts_sent += 1;
                CycleOutcome::Alerted { change, region }
            }
            Err(e) => {
                log::error!(
                    "camera {}: alert delivery failed: {:#}",
                    self.camera.name,
                    e
                );
                CycleOutcome::DeliveryFailed { change }
            }
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        match self.last_alert {
            None => true,
            Some(at) => at.elapsed() > self.camera.cooldown,
        }
    }

    /// Encode the frame to a transient file and hand it to the
    /// notifier. The file is removed whatever the delivery outcome.
    fn deliver(&self, frame: &Frame, region: &Region, change: f64) -> Result<()> {
        log::info!(
            "camera {}: motion detected (change {:.2}%)",
            self.camera.name,
            change
        );

        let mut snapshot = frame.clone();
        if self.tuning.annotate {
            snapshot.annotate(region);
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before epoch")?
            .as_secs();
        let path = std::env::temp_dir().join(format!(
            "snapshot_{}_{}.jpg",
            self.camera.name, stamp
        ));

        snapshot.write_jpeg(&path)?;
        let result = self.notifier.send_photo(
            &path,
            &format!("{}: motion detected", self.camera.name),
        );
        if let Err(e) = std::fs::remove_file(&path) {
            log::debug!(
                "camera {}: could not remove {}: {}",
                self.camera.name,
                path.display(),
                e
            );
        }
        result
    }
}
