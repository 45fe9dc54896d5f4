//! Snapshot frame sources.
//!
//! A `SnapshotSource` supplies the next decoded frame for one camera:
//! - http(s):// locators download a single JPEG snapshot per fetch,
//!   decoded in-memory, with a hard request timeout;
//! - stub:// locators produce deterministic synthetic frames for demos
//!   and tests.
//!
//! Fetch failures are transient by contract: the watch loop retries
//! after a fixed backoff forever and never escalates them.

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::frame::Frame;

/// Upper bound on one downloaded snapshot.
const MAX_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;

/// Supplies the next decoded frame for a camera.
pub trait FrameSource {
    fn fetch(&mut self) -> Result<Frame>;
}

/// Configuration for a snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Snapshot locator. Supported schemes: http(s)://, stub://.
    pub url: String,
    /// Hard timeout on one snapshot request.
    pub timeout: Duration,
}

/// Snapshot frame source with HTTP and synthetic backends.
pub struct SnapshotSource {
    backend: SnapshotBackend,
}

enum SnapshotBackend {
    Http(HttpSnapshotSource),
    Synthetic(SyntheticSource),
}

impl SnapshotSource {
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse snapshot url")?;
        let backend = match url.scheme() {
            "http" | "https" => SnapshotBackend::Http(HttpSnapshotSource::new(config)),
            "stub" => SnapshotBackend::Synthetic(SyntheticSource::new()),
            other => {
                return Err(anyhow!(
                    "unsupported snapshot scheme '{}'; expected http(s) or stub",
                    other
                ))
            }
        };
        Ok(Self { backend })
    }
}

impl FrameSource for SnapshotSource {
    fn fetch(&mut self) -> Result<Frame> {
        match &mut self.backend {
            SnapshotBackend::Http(source) => source.fetch(),
            SnapshotBackend::Synthetic(source) => source.fetch(),
        }
    }
}

struct HttpSnapshotSource {
    url: String,
    agent: ureq::Agent,
}

impl HttpSnapshotSource {
    fn new(config: SnapshotConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            url: config.url,
            agent,
        }
    }

    fn fetch(&mut self) -> Result<Frame> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("fetch snapshot from {}", self.url))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_SNAPSHOT_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .context("read snapshot body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty snapshot body"));
        }
        if bytes.len() > MAX_SNAPSHOT_BYTES {
            return Err(anyhow!(
                "snapshot exceeds {} byte limit",
                MAX_SNAPSHOT_BYTES
            ));
        }

        Frame::decode_jpeg(&bytes)
    }
}

/// Deterministic synthetic frames: a gray field with a bright square
/// that moves one step per fetch, so consecutive frames always differ.
struct SyntheticSource {
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticSource {
    fn new() -> Self {
        Self {
            width: 320,
            height: 240,
            frame_count: 0,
        }
    }

    fn fetch(&mut self) -> Result<Frame> {
        let mut data = vec![60u8; self.width as usize * self.height as usize * 3];

        let square = 40u32;
        let steps = (self.width - square) as u64;
        let x0 = (self.frame_count * 8 % steps.max(1)) as u32;
        let y0 = (self.height - square) / 2;
        for y in y0..y0 + square {
            for x in x0..x0 + square {
                let idx = (y as usize * self.width as usize + x as usize) * 3;
                data[idx..idx + 3].copy_from_slice(&[230, 230, 230]);
            }
        }

        self.frame_count += 1;
        Frame::from_rgb8(data, self.width, self.height)
    }
}
