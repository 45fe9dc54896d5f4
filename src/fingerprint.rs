//! Perceptual frame fingerprints.
//!
//! A fingerprint is a 64-bit difference hash: the frame is reduced to a
//! 9x8 grid of block-mean luma values and each bit records whether a
//! cell is darker than its right neighbor. Two frames are compared by
//! Hamming distance over those bits, which is robust to compression
//! noise and small lighting shifts while still moving sharply when the
//! scene content moves.
//!
//! The grid means are computed directly (no resampling filter) so the
//! hash of a constructed frame is fully deterministic.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// Bits in a fingerprint.
pub const FINGERPRINT_BITS: u32 = 64;

const GRID_COLS: u32 = 9;
const GRID_ROWS: u32 = 8;

/// 64-bit difference hash of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a frame. Fails when the frame is smaller than the
    /// hash grid; the watch loop treats that as a skipped cycle.
    pub fn of(frame: &Frame) -> Result<Self> {
        let (width, height) = frame.dimensions();
        if width < GRID_COLS || height < GRID_ROWS {
            return Err(anyhow!(
                "frame {}x{} too small to fingerprint (need at least {}x{})",
                width,
                height,
                GRID_COLS,
                GRID_ROWS
            ));
        }

        let grid = luma_grid(frame);
        let mut bits = 0u64;
        for row in 0..GRID_ROWS as usize {
            for col in 0..(GRID_COLS - 1) as usize {
                if grid[row][col] < grid[row][col + 1] {
                    bits |= 1 << (row * (GRID_COLS - 1) as usize + col);
                }
            }
        }
        Ok(Fingerprint(bits))
    }

    /// Hamming distance to another fingerprint.
    pub fn distance(self, other: Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Distance expressed as a percentage of the full bit length.
    pub fn distance_percent(self, other: Fingerprint) -> f64 {
        self.distance(other) as f64 / FINGERPRINT_BITS as f64 * 100.0
    }
}

/// Integer luma approximation; the weights sum to 256 so a gray pixel
/// (v, v, v) maps to exactly v.
fn luma(rgb: [u8; 3]) -> u32 {
    (77 * rgb[0] as u32 + 150 * rgb[1] as u32 + 29 * rgb[2] as u32) >> 8
}

/// Block-mean luma over a 9x8 partition of the frame. Cell (r, c)
/// averages the pixel block rows [r*h/8, (r+1)*h/8) x cols
/// [c*w/9, (c+1)*w/9); a frame that is exactly 9x8 maps one pixel per
/// cell.
fn luma_grid(frame: &Frame) -> [[u32; GRID_COLS as usize]; GRID_ROWS as usize] {
    let (width, height) = frame.dimensions();
    let mut grid = [[0u32; GRID_COLS as usize]; GRID_ROWS as usize];

    for row in 0..GRID_ROWS {
        let y0 = row * height / GRID_ROWS;
        let y1 = (row + 1) * height / GRID_ROWS;
        for col in 0..GRID_COLS {
            let x0 = col * width / GRID_COLS;
            let x1 = (col + 1) * width / GRID_COLS;

            let mut sum = 0u64;
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += luma(frame.rgb_at(x, y)) as u64;
                    count += 1;
                }
            }
            grid[row as usize][col as usize] = (sum / count.max(1)) as u32;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 9x8 gray frame built from explicit per-row pixel values; each
    /// grid cell is exactly one pixel.
    fn frame_from_rows(rows: [[u8; 9]; 8]) -> Frame {
        let mut data = Vec::with_capacity(9 * 8 * 3);
        for row in rows {
            for v in row {
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::from_rgb8(data, 9, 8).unwrap()
    }

    const ASCENDING: [u8; 9] = [0, 10, 20, 30, 40, 50, 60, 70, 80];
    const DESCENDING: [u8; 9] = [80, 70, 60, 50, 40, 30, 20, 10, 0];

    #[test]
    fn identical_frames_have_distance_zero() {
        let frame = frame_from_rows([ASCENDING; 8]);
        let a = Fingerprint::of(&frame).unwrap();
        let b = Fingerprint::of(&frame).unwrap();
        assert_eq!(a.distance(b), 0);
        assert_eq!(a.distance_percent(b), 0.0);
    }

    #[test]
    fn one_reversed_row_flips_eight_bits() {
        let base = frame_from_rows([ASCENDING; 8]);
        let mut rows = [ASCENDING; 8];
        rows[0] = DESCENDING;
        let variant = frame_from_rows(rows);

        let a = Fingerprint::of(&base).unwrap();
        let b = Fingerprint::of(&variant).unwrap();
        assert_eq!(a.distance(b), 8);
        assert_eq!(a.distance_percent(b), 12.5);
    }

    #[test]
    fn fully_reversed_frame_flips_every_bit() {
        let a = Fingerprint::of(&frame_from_rows([ASCENDING; 8])).unwrap();
        let b = Fingerprint::of(&frame_from_rows([DESCENDING; 8])).unwrap();
        assert_eq!(a.distance(b), 64);
        assert_eq!(a.distance_percent(b), 100.0);
    }

    #[test]
    fn uniform_brightness_shift_keeps_distance_zero() {
        let base = frame_from_rows([ASCENDING; 8]);
        let lifted = frame_from_rows([[
            30, 40, 50, 60, 70, 80, 90, 100, 110,
        ]; 8]);
        let a = Fingerprint::of(&base).unwrap();
        let b = Fingerprint::of(&lifted).unwrap();
        assert_eq!(a.distance(b), 0);
    }

    #[test]
    fn undersized_frame_is_rejected() {
        let frame = Frame::from_rgb8(vec![0u8; 4 * 4 * 3], 4, 4).unwrap();
        assert!(Fingerprint::of(&frame).is_err());
    }
}
