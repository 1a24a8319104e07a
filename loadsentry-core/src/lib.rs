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

//! Loadsentry Core
//!
//! Streaming anomaly analysis for load samples. A bounded window of recent
//! requests-per-second values is kept behind a reader/writer lock and every
//! new sample is scored against the window as it was *before* the sample
//! arrived.

pub mod analyzer;
pub mod error;
pub mod sample;
pub mod stats;

pub use analyzer::Analyzer;
pub use error::{ConfigError, SampleError};
pub use sample::{now_unix_secs, Sample, Verdict, MAX_RPS};
pub use stats::{StatWindow, WindowSize, DEFAULT_WINDOW_SIZE};

/// Default anomaly threshold, in standard deviations.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
