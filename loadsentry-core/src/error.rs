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

//! Error types for sample validation and analyzer construction.

use thiserror::Error;

/// A sample was rejected before it could enter the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("rps must be >= 0, got {0}")]
    NegativeRps(f64),

    #[error("rps must be a finite number")]
    NonFiniteRps,

    #[error("rps must be <= 1e12, got {0}")]
    RpsTooLarge(f64),
}

/// Invalid construction parameters for the analyzer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,

    #[error("z threshold must be finite and >= 0, got {0}")]
    InvalidThreshold(f64),
}
