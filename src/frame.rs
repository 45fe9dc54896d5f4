//! Decoded frame container.
//!
//! `Frame` is the unit every other module works on: an owned RGB8 pixel
//! buffer plus dimensions. Frames are produced by the ingestion layer
//! (JPEG decode in-memory) and consumed by fingerprinting, region
//! localization, and alert snapshot encoding.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::bounds::Region;

/// Bytes per pixel for the RGB8 layout used throughout the crate.
const BYTES_PER_PIXEL: usize = 3;

/// Thickness of the annotation border drawn around a changed region.
const ANNOTATION_THICKNESS: u32 = 2;

/// Annotation border color (red, matching the alert snapshots the
/// monitor has always produced).
const ANNOTATION_RGB: [u8; 3] = [255, 0, 0];

/// An owned, decoded camera frame in RGB8 row-major layout.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a raw RGB8 buffer. Fails if the buffer does not match the
    /// stated dimensions.
    pub fn from_rgb8(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(anyhow!(
                "rgb8 buffer size mismatch: got {} bytes for {}x{} (expected {})",
                data.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode a JPEG snapshot in-memory.
    pub fn decode_jpeg(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode jpeg")?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            data: rgb.into_raw(),
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGB channels of the pixel at (x, y). Panics if out of bounds;
    /// callers index within `dimensions()`.
    pub(crate) fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&rgb);
    }

    /// Draw a red border around `region`, clamped to the frame bounds.
    pub fn annotate(&mut self, region: &Region) {
        if region.is_empty() {
            return;
        }
        let x0 = region.x.min(self.width.saturating_sub(1));
        let y0 = region.y.min(self.height.saturating_sub(1));
        let x1 = (region.x + region.width).min(self.width);
        let y1 = (region.y + region.height).min(self.height);

        for t in 0..ANNOTATION_THICKNESS {
            // Horizontal edges.
            for x in x0..x1 {
                if y0 + t < y1 {
                    self.put_rgb(x, y0 + t, ANNOTATION_RGB);
                }
                if y1 > t + 1 && y1 - t - 1 >= y0 {
                    self.put_rgb(x, y1 - t - 1, ANNOTATION_RGB);
                }
            }
            // Vertical edges.
            for y in y0..y1 {
                if x0 + t < x1 {
                    self.put_rgb(x0 + t, y, ANNOTATION_RGB);
                }
                if x1 > t + 1 && x1 - t - 1 >= x0 {
                    self.put_rgb(x1 - t - 1, y, ANNOTATION_RGB);
                }
            }
        }
    }

    /// Encode the frame as JPEG at `path`.
    pub fn write_jpeg(&self, path: &Path) -> Result<()> {
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
            image::ImageFormat::Jpeg,
        )
        .with_context(|| format!("write jpeg snapshot {}", path.display()))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
