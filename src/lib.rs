//! snapwatch
//!
//! An adaptive snapshot-polling camera monitor. One worker per enabled
//! camera polls a JPEG snapshot endpoint, compares each frame against
//! the previous one with a perceptual fingerprint, localizes the
//! changed region, and pushes an annotated alert snapshot to Telegram,
//! subject to a per-camera cooldown.
//!
//! # Architecture
//!
//! - `config`: TOML + environment configuration, validated once at
//!   startup
//! - `frame`: decoded RGB8 frames (JPEG decode/encode, annotation)
//! - `fingerprint`: 64-bit difference hash and Hamming distance
//! - `bounds`: minimal bounding rectangle of changed pixels
//! - `tracker`: shared adaptive per-camera alert thresholds
//! - `ingest`: snapshot frame sources (HTTP, stub)
//! - `notify`: Telegram delivery behind the `Notifier` trait
//! - `watch`: the per-camera fetch/compare/decide/notify loop
//!
//! Camera workers are independent and share nothing but the threshold
//! tracker; one camera failing forever never affects the others.

pub mod bounds;
pub mod config;
pub mod fingerprint;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod tracker;
pub mod watch;

pub use bounds::{diff_bounds, DimensionMismatch, Region};
pub use config::{CameraConfig, DetectionConfig, TelegramSettings, WatchConfig};
pub use fingerprint::{Fingerprint, FINGERPRINT_BITS};
pub use frame::Frame;
pub use ingest::{FrameSource, SnapshotConfig, SnapshotSource};
pub use notify::{Notifier, TelegramNotifier};
pub use tracker::ThresholdTracker;
pub use watch::{CameraWatcher, CycleOutcome};
