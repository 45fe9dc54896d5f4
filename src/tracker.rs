//! Adaptive per-camera alert thresholds.
//!
//! One `ThresholdTracker` is shared by every camera worker. It keeps a
//! bounded FIFO window of change percentages from past delivered alerts
//! per camera and derives a dynamic threshold from them: the mean times
//! a multiplier, floored by the 95th-percentile sample. The stricter
//! bound wins, so a run of small confirmed events cannot drag the
//! threshold down.
//!
//! Two quirks are deliberate and covered by tests:
//! - `add` seeds a camera's first history entry with the shared
//!   fallback value, smoothing the first statistics against a single
//!   outlier;
//! - `get` on a camera with no history stores its fallback argument as
//!   the new shared fallback (a read with a write side effect), and
//!   that scalar is process-wide, not per-camera.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const PERCENTILE: f64 = 0.95;

/// Shared history of confirmed change magnitudes with a derived
/// dynamic threshold per camera.
pub struct ThresholdTracker {
    state: Mutex<TrackerState>,
    history_cap: usize,
    min_events: usize,
    multiplier: f64,
}

struct TrackerState {
    history: HashMap<String, VecDeque<f64>>,
    fallback_base: f64,
}

impl ThresholdTracker {
    pub fn new(history_cap: usize, min_events: usize, multiplier: f64) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                history: HashMap::new(),
                fallback_base: 0.0,
            }),
            history_cap,
            min_events,
            multiplier,
        }
    }

    /// Record a delivered alert's change percentage for `camera`.
    ///
    /// A camera's first record is preceded by the current shared
    /// fallback value; the window then evicts oldest-first past the cap.
    pub fn add(&self, camera: &str, percent: f64) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        let seed = state.fallback_base;
        let history = state.history.entry(camera.to_string()).or_default();

        if history.is_empty() {
            history.push_back(seed);
        }
        history.push_back(percent);
        while history.len() > self.history_cap {
            history.pop_front();
        }
    }

    /// Dynamic threshold for `camera`, or `fallback` while the history
    /// is too short to trust.
    ///
    /// Querying a camera with no history stores `fallback` as the new
    /// shared fallback value before returning it.
    pub fn get(&self, camera: &str, fallback: f64) -> f64 {
        let mut state = self.state.lock().expect("tracker lock poisoned");

        let len = state.history.get(camera).map_or(0, VecDeque::len);
        if len == 0 {
            state.fallback_base = fallback;
            return fallback;
        }
        if len < self.min_events {
            return fallback;
        }

        let history = &state.history[camera];
        let mut sorted: Vec<f64> = history.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let p95 = sorted[(sorted.len() as f64 * PERCENTILE) as usize];
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

        (mean * self.multiplier).max(p95)
    }

    /// Number of recorded entries for `camera` (health logging).
    pub fn history_len(&self, camera: &str) -> usize {
        let state = self.state.lock().expect("tracker lock poisoned");
        state.history.get(camera).map_or(0, VecDeque::len)
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self, camera: &str) -> Vec<f64> {
        let state = self.state.lock().expect("tracker lock poisoned");
        state
            .history
            .get(camera)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_returns_fallback_unchanged() {
        let tracker = ThresholdTracker::new(100, 10, 1.15);
        for _ in 0..5 {
            tracker.add("yard", 25.0);
        }
        // 5 records + the seed is still under min_events.
        assert_eq!(tracker.history_len("yard"), 6);
        assert_eq!(tracker.get("yard", 20.0), 20.0);
    }

    #[test]
    fn empty_query_stores_shared_fallback() {
        let tracker = ThresholdTracker::new(100, 10, 1.15);
        assert_eq!(tracker.get("front", 42.0), 42.0);

        // The stored fallback seeds the NEXT camera's first record:
        // the scalar is process-wide, not per-camera.
        tracker.add("back", 10.0);
        assert_eq!(tracker.snapshot("back"), vec![42.0, 10.0]);
    }

    #[test]
    fn percentile_wins_over_small_mean() {
        let tracker = ThresholdTracker::new(100, 3, 2.0);
        for v in [10.0, 20.0, 30.0] {
            tracker.add("cam", v);
        }
        // History [0, 10, 20, 30]: p95 index floor(0.95*4)=3 -> 30,
        // mean 15 * 2.0 = 30; both bounds agree here.
        assert_eq!(tracker.get("cam", 99.0), 30.0);
    }

    #[test]
    fn mean_multiplier_wins_over_percentile() {
        let tracker = ThresholdTracker::new(100, 3, 1.5);
        for _ in 0..3 {
            tracker.add("cam", 10.0);
        }
        // History [0, 10, 10, 10]: mean 7.5 * 1.5 = 11.25, p95 = 10.
        let threshold = tracker.get("cam", 99.0);
        assert_eq!(threshold, 11.25);
        assert!(threshold >= 10.0);
    }

    #[test]
    fn result_bounds_both_statistics() {
        let tracker = ThresholdTracker::new(100, 5, 1.15);
        let values = [5.0, 7.0, 9.0, 11.0, 13.0, 40.0];
        for v in values {
            tracker.add("cam", v);
        }
        let history = tracker.snapshot("cam");
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let mut sorted = history.clone();
        sorted.sort_by(f64::total_cmp);
        let p95 = sorted[(sorted.len() as f64 * 0.95) as usize];

        let threshold = tracker.get("cam", 0.0);
        assert!(threshold >= mean * 1.15);
        assert!(threshold >= p95);
        assert_eq!(threshold, (mean * 1.15f64).max(p95));
    }

    #[test]
    fn window_evicts_oldest_first_at_cap() {
        let tracker = ThresholdTracker::new(100, 10, 1.15);
        for i in 0..150 {
            tracker.add("cam", i as f64);
        }
        let history = tracker.snapshot("cam");
        assert_eq!(history.len(), 100);
        // The seed and the oldest 50 recorded values are gone; what
        // remains is exactly the newest 100 in insertion order.
        let expected: Vec<f64> = (50..150).map(|i| i as f64).collect();
        assert_eq!(history, expected);
    }
}
