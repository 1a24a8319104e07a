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

use anyhow::Result;
use loadsentry_core::{DEFAULT_WINDOW_SIZE, DEFAULT_Z_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::ingestion::PipelineConfig;
use crate::store::DEFAULT_HISTORY_LIMIT;

pub const ENV_LISTEN_ADDR: &str = "LOADSENTRY_LISTEN_ADDR";
pub const ENV_REQUEST_TIMEOUT: &str = "LOADSENTRY_REQUEST_TIMEOUT";
pub const ENV_WINDOW_SIZE: &str = "LOADSENTRY_WINDOW_SIZE";
pub const ENV_Z_THRESHOLD: &str = "LOADSENTRY_Z_THRESHOLD";
pub const ENV_QUEUE_SIZE: &str = "LOADSENTRY_QUEUE_SIZE";
pub const ENV_STORE_ENABLED: &str = "LOADSENTRY_STORE_ENABLED";
pub const ENV_STORE_HISTORY: &str = "LOADSENTRY_STORE_HISTORY";

/// Loadsentry Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Request timeout in seconds; slower requests get 408
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Number of most recent rps values kept in the rolling window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// |z| at or above this marks a sample anomalous
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Pending samples before /ingest starts answering 503
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pending side store writes before new writes are dropped
    #[serde(default = "default_forward_capacity")]
    pub forward_capacity: usize,

    /// Timeout for a single side store write, in milliseconds
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Keep processed samples in the in-memory side store
    #[serde(default = "default_store_enabled")]
    pub enabled: bool,

    /// Entries retained by the side store
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

// Default values
fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_z_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_forward_capacity() -> usize {
    1024
}

fn default_forward_timeout_ms() -> u64 {
    500
}

fn default_store_enabled() -> bool {
    true
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            z_threshold: default_z_threshold(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            forward_capacity: default_forward_capacity(),
            forward_timeout_ms: default_forward_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: default_store_enabled(),
            history_limit: default_history_limit(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        config.merge_with_env();
        Ok(config)
    }

    /// Override fields from process environment variables.
    ///
    /// Supported environment variables:
    /// - LOADSENTRY_LISTEN_ADDR: HTTP listen address (default: 0.0.0.0:8080)
    /// - LOADSENTRY_REQUEST_TIMEOUT: Request timeout in seconds (default: 10)
    /// - LOADSENTRY_WINDOW_SIZE: Rolling window size (default: 50)
    /// - LOADSENTRY_Z_THRESHOLD: Anomaly z-score threshold (default: 2.0)
    /// - LOADSENTRY_QUEUE_SIZE: Ingest queue capacity (default: 10000)
    /// - LOADSENTRY_STORE_ENABLED: Keep processed samples (default: true)
    /// - LOADSENTRY_STORE_HISTORY: Side store history length (default: 1000)
    pub fn merge_with_env(&mut self) {
        self.merge_with(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary key lookup. Values that fail to
    /// parse are ignored and the previous value is kept.
    pub fn merge_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            self.server.listen_addr = addr;
        }
        override_parsed(
            &lookup,
            ENV_REQUEST_TIMEOUT,
            &mut self.server.request_timeout_secs,
        );
        override_parsed(&lookup, ENV_WINDOW_SIZE, &mut self.analysis.window_size);
        override_parsed(&lookup, ENV_Z_THRESHOLD, &mut self.analysis.z_threshold);
        override_parsed(&lookup, ENV_QUEUE_SIZE, &mut self.ingest.queue_capacity);
        override_parsed(&lookup, ENV_STORE_ENABLED, &mut self.store.enabled);
        override_parsed(&lookup, ENV_STORE_HISTORY, &mut self.store.history_limit);
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            forward_capacity: self.ingest.forward_capacity,
            forward_timeout: Duration::from_millis(self.ingest.forward_timeout_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than zero");
        }

        if self.analysis.window_size == 0 {
            anyhow::bail!("analysis.window_size must be greater than zero");
        }
        if !self.analysis.z_threshold.is_finite() || self.analysis.z_threshold < 0.0 {
            anyhow::bail!(
                "analysis.z_threshold must be a finite, non-negative number (got {})",
                self.analysis.z_threshold
            );
        }
        if self.ingest.queue_capacity == 0 {
            anyhow::bail!("ingest.queue_capacity must be greater than zero");
        }
        if self.ingest.forward_capacity == 0 {
            anyhow::bail!("ingest.forward_capacity must be greater than zero");
        }
        if self.ingest.forward_timeout_ms == 0 {
            anyhow::bail!("ingest.forward_timeout_ms must be greater than zero");
        }

        Ok(())
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring unparsable {}={:?}", key, raw),
    }
}
