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
use clap::Parser;
use loadsentry_server::{config::ServerConfig, init_tracing, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file and environment)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Rolling window size
    #[arg(long)]
    window_size: Option<usize>,

    /// Anomaly z-score threshold
    #[arg(long)]
    z_threshold: Option<f64>,

    /// Ingest queue capacity
    #[arg(long)]
    queue_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Disable the in-memory side store
    #[arg(long)]
    no_store: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOADSENTRY_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(window) = args.window_size {
        config.analysis.window_size = window;
    }
    if let Some(threshold) = args.z_threshold {
        config.analysis.z_threshold = threshold;
    }
    if let Some(queue) = args.queue_size {
        config.ingest.queue_capacity = queue;
    }
    if let Some(secs) = args.request_timeout {
        config.server.request_timeout_secs = secs;
    }
    if args.no_store {
        config.store.enabled = false;
    }

    run_server(config).await
}
