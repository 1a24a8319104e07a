// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thread-safe rolling z-score analyzer
//!
//! The analyzer owns the only mutable analysis state in the process: the
//! rps window, the processed counter and the most recent verdict. All of it
//! sits behind one reader/writer lock:
//!
//! - [`Analyzer::process`] holds the write lock for its whole body, so
//!   concurrent callers are serialized and never observe a partial update.
//! - [`Analyzer::snapshot`] takes the read lock and may run alongside other
//!   snapshots.

use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::sample::{now_unix_secs, Sample, Verdict};
use crate::stats::{z_score, StatWindow, WindowSize};

#[derive(Debug)]
struct AnalyzerState {
    window: StatWindow,
    processed: u64,
    last: Verdict,
}

/// Rolling-window anomaly analyzer for a single rps signal.
#[derive(Debug)]
pub struct Analyzer {
    state: RwLock<AnalyzerState>,
    threshold: f64,
}

impl Analyzer {
    pub fn new(window_size: WindowSize, threshold: f64) -> Self {
        Self {
            state: RwLock::new(AnalyzerState {
                window: StatWindow::new(window_size),
                processed: 0,
                last: Verdict::default(),
            }),
            threshold,
        }
    }

    /// Build from raw configuration values.
    pub fn with_config(window_size: usize, threshold: f64) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self::new(WindowSize::new(window_size)?, threshold))
    }

    /// Score a sample against the current window, then add it to the window.
    ///
    /// The z-score uses the window statistics from *before* the sample is
    /// inserted; the reported average is taken *after* insertion. Swapping
    /// the two changes the numbers, so the order below is fixed.
    pub fn process(&self, sample: Sample) -> Verdict {
        let mut state = self.state.write();

        let timestamp = if sample.has_timestamp() {
            sample.timestamp
        } else {
            now_unix_secs()
        };

        let (mean_prev, stddev_prev) = state.window.moments();
        let rps_z = z_score(sample.rps, mean_prev, stddev_prev);
        let anomaly = rps_z.abs() >= self.threshold;

        state.window.push(sample.rps);
        let rps_avg = state.window.mean();

        state.processed += 1;

        let verdict = Verdict {
            timestamp,
            rps_avg,
            rps_z,
            anomaly,
            window: state.window.capacity(),
            count: state.processed,
        };
        state.last = verdict;
        verdict
    }

    /// Most recent verdict, or the default (`count == 0`) if nothing has
    /// been processed yet.
    pub fn snapshot(&self) -> Verdict {
        self.state.read().last
    }

    /// Number of values currently held in the window.
    pub fn window_len(&self) -> usize {
        self.state.read().window.len()
    }

    /// Configured window capacity.
    pub fn window_size(&self) -> usize {
        self.state.read().window.capacity()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
