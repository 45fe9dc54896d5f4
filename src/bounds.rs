//! Changed-region localization.
//!
//! `diff_bounds` walks two equal-sized frames pixel by pixel and returns
//! the smallest axis-aligned rectangle covering every pixel whose color
//! moved by more than the configured per-channel delta. An empty
//! rectangle means "no localizable change" and callers use it to veto
//! alerts that a fingerprint distance alone would have fired (global
//! flicker has a large distance but no spatial footprint).
//!
//! Channel deltas are compared on the 16-bit channel scale: each 8-bit
//! channel value v is widened to `v << 8 | v` before differencing, so a
//! delta of 20 flags any pixel that changed at all (one 8-bit step is
//! 257 on that scale).

use crate::frame::Frame;

/// Axis-aligned rectangle in pixel coordinates. Zero width or height
/// means the empty rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const EMPTY: Region = Region {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// The two frames handed to `diff_bounds` had different dimensions.
#[derive(Clone, Debug)]
pub struct DimensionMismatch {
    pub previous: (u32, u32),
    pub current: (u32, u32),
}

impl std::fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame dimensions changed: {}x{} -> {}x{}",
            self.previous.0, self.previous.1, self.current.0, self.current.1
        )
    }
}

impl std::error::Error for DimensionMismatch {}

fn widen(v: u8) -> i32 {
    ((v as i32) << 8) | v as i32
}

fn pixel_changed(a: [u8; 3], b: [u8; 3], channel_delta: u16) -> bool {
    let delta = channel_delta as i32;
    (0..3).any(|c| (widen(a[c]) - widen(b[c])).abs() > delta)
}

/// Smallest rectangle covering all pixels whose channel delta exceeds
/// `channel_delta` (16-bit channel scale). Returns `Region::EMPTY` when
/// nothing moved. O(width × height).
pub fn diff_bounds(
    previous: &Frame,
    current: &Frame,
    channel_delta: u16,
) -> Result<Region, DimensionMismatch> {
    if previous.dimensions() != current.dimensions() {
        return Err(DimensionMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }

    let (width, height) = current.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut changed = false;

    for y in 0..height {
        for x in 0..width {
            if pixel_changed(previous.rgb_at(x, y), current.rgb_at(x, y), channel_delta) {
                changed = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if !changed {
        return Ok(Region::EMPTY);
    }
    Ok(Region {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
