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

//! Rolling window statistics
//!
//! First and second moment helpers plus a bounded FIFO window of rps values.
//! All statistics are population statistics (divide by N) and every helper is
//! defined on empty input, returning 0.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::error::ConfigError;

/// Default number of samples kept in the window.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Upper bound on the up-front allocation for a window.
const PREALLOC_LIMIT: usize = 4096;

/// Arithmetic mean, 0 for an empty sequence.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Population standard deviation around `mean`, 0 for an empty sequence.
pub fn stddev<I>(values: I, mean: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum_sq, n) = values.into_iter().fold((0.0, 0usize), |(acc, n), v| {
        let diff = v - mean;
        (acc + diff * diff, n + 1)
    });
    if n == 0 {
        0.0
    } else {
        (sum_sq / n as f64).sqrt()
    }
}

/// Append `value` and evict from the front until at most `limit` remain.
pub fn insert_bounded(window: &mut VecDeque<f64>, value: f64, limit: usize) {
    window.push_back(value);
    while window.len() > limit {
        window.pop_front();
    }
}

/// Standard score of `value`. A zero (or empty-history) deviation yields
/// exactly 0, so a flat history never flags on its own.
pub fn z_score(value: f64, mean: f64, stddev: f64) -> f64 {
    if stddev > 0.0 {
        (value - mean) / stddev
    } else {
        0.0
    }
}

/// Window capacity, guaranteed to be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSize(NonZeroUsize);

impl WindowSize {
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(size)
            .map(Self)
            .ok_or(ConfigError::ZeroWindow)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

impl TryFrom<usize> for WindowSize {
    type Error = ConfigError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

/// Bounded, arrival-ordered history of rps values.
#[derive(Debug, Clone)]
pub struct StatWindow {
    values: VecDeque<f64>,
    capacity: WindowSize,
}

impl StatWindow {
    pub fn new(capacity: WindowSize) -> Self {
        let prealloc = capacity.get().saturating_add(1).min(PREALLOC_LIMIT);
        Self {
            values: VecDeque::with_capacity(prealloc),
            capacity,
        }
    }

    /// Insert a value, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        insert_bounded(&mut self.values, value, self.capacity.get());
    }

    pub fn mean(&self) -> f64 {
        mean(self.values.iter().copied())
    }

    /// `(mean, population stddev)` of the current contents.
    ///
    /// A window whose values are all equal has a stddev of exactly 0, even
    /// when rounding leaves the computed mean a few ulps away from the value.
    pub fn moments(&self) -> (f64, f64) {
        let m = self.mean();
        if self.is_flat() {
            return (m, 0.0);
        }
        (m, stddev(self.values.iter().copied(), m))
    }

    /// True when empty or when every value is identical.
    pub fn is_flat(&self) -> bool {
        let mut values = self.values.iter();
        match values.next() {
            Some(first) => values.all(|v| v == first),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Values oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}
