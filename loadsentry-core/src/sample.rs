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

//! Load samples and the per-sample analysis result.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SampleError;

/// Largest accepted rps value. Keeps window sums and squared deviations
/// finite for any window size.
pub const MAX_RPS: f64 = 1e12;

/// One load observation.
///
/// `timestamp` is seconds since the Unix epoch. Zero means "not provided";
/// the analyzer stamps such samples with the current time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub cpu: f64,
    pub rps: f64,
}

impl Sample {
    pub fn new(timestamp: i64, cpu: f64, rps: f64) -> Self {
        Self { timestamp, cpu, rps }
    }

    /// Sample with only an rps value; timestamp is left unset.
    pub fn from_rps(rps: f64) -> Self {
        Self::new(0, 0.0, rps)
    }

    /// Check the invariants the analyzer relies on.
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.rps.is_finite() {
            return Err(SampleError::NonFiniteRps);
        }
        if self.rps < 0.0 {
            return Err(SampleError::NegativeRps(self.rps));
        }
        if self.rps > MAX_RPS {
            return Err(SampleError::RpsTooLarge(self.rps));
        }
        Ok(())
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp != 0
    }
}

/// Analysis result for a single processed sample.
///
/// `rps_z` is computed against the window *before* the sample was inserted,
/// while `rps_avg` is the mean of the window *after* insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub timestamp: i64,
    pub rps_avg: f64,
    pub rps_z: f64,
    pub anomaly: bool,
    pub window: usize,
    pub count: u64,
}

impl Verdict {
    /// `false` for the default verdict returned before anything was processed.
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_negative_rps() {
        let sample = Sample::from_rps(-1.0);
        assert_eq!(sample.validate(), Err(SampleError::NegativeRps(-1.0)));
    }

    #[test]
    fn test_validate_rejects_non_finite_rps() {
        assert_eq!(
            Sample::from_rps(f64::NAN).validate(),
            Err(SampleError::NonFiniteRps)
        );
        assert_eq!(
            Sample::from_rps(f64::INFINITY).validate(),
            Err(SampleError::NonFiniteRps)
        );
    }

    #[test]
    fn test_validate_caps_rps() {
        assert!(Sample::from_rps(MAX_RPS).validate().is_ok());
        assert_eq!(
            Sample::from_rps(f64::MAX).validate(),
            Err(SampleError::RpsTooLarge(f64::MAX))
        );
    }

    #[test]
    fn test_validate_accepts_zero_and_negative_cpu() {
        assert!(Sample::new(1, -5.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let sample: Sample = serde_json::from_str(r#"{"rps": 12.5}"#).unwrap();
        assert_eq!(sample, Sample::new(0, 0.0, 12.5));
        assert!(!sample.has_timestamp());
    }

    #[test]
    fn test_decode_requires_rps() {
        let result: Result<Sample, _> = serde_json::from_str(r#"{"cpu": 0.4}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_verdict_json_keys() {
        let verdict = Verdict {
            timestamp: 1_700_000_000,
            rps_avg: 10.0,
            rps_z: 0.5,
            anomaly: false,
            window: 50,
            count: 3,
        };
        let value = serde_json::to_value(verdict).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["anomaly", "count", "rps_avg", "rps_z", "timestamp", "window"]
        );
    }

    #[test]
    fn test_default_verdict_has_no_data() {
        assert!(!Verdict::default().has_data());
    }
}
