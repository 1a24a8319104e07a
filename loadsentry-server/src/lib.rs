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

//! Loadsentry Server
//!
//! HTTP sidecar that ingests load samples, scores them against a rolling
//! window and exposes the latest verdict plus Prometheus metrics.

pub mod api;
pub mod config;
pub mod ingestion;
pub mod metrics;
pub mod middleware;
pub mod store;

use anyhow::{Context, Result};
use loadsentry_core::Analyzer;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::ServerConfig;
use ingestion::{IngestQueue, Pipeline};
use metrics::{PipelineCounters, PrometheusMetrics};
use store::{MemoryStore, NullStore, SideStore};

const DEFAULT_LOG_FILTER: &str = "loadsentry_server=info,tower_http=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (plain, structured) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init();
}

/// Everything the server needs, wired together but not yet running.
pub struct Components {
    pub state: AppState,
    pub pipeline: Pipeline,
}

/// Wire analyzer, queue, pipeline and metrics from a validated config.
pub fn build_components(config: &ServerConfig) -> Result<Components> {
    let metrics = Arc::new(PrometheusMetrics::new().context("registering metrics")?);
    let counters: Arc<dyn PipelineCounters> = metrics.clone();

    let analyzer = Arc::new(
        Analyzer::with_config(config.analysis.window_size, config.analysis.z_threshold)
            .context("invalid analysis settings")?,
    );

    let capacity = NonZeroUsize::new(config.ingest.queue_capacity)
        .context("ingest.queue_capacity must be greater than zero")?;
    let (queue, receiver) = IngestQueue::bounded(capacity, counters.clone());

    let memory_store = config
        .store
        .enabled
        .then(|| Arc::new(MemoryStore::new(config.store.history_limit)));
    let side_store: Arc<dyn SideStore> = match &memory_store {
        Some(store) => store.clone(),
        None => Arc::new(NullStore),
    };

    let pipeline = Pipeline::new(
        analyzer.clone(),
        receiver,
        counters,
        side_store,
        config.pipeline_config(),
    );

    Ok(Components {
        state: AppState {
            analyzer,
            queue,
            metrics,
            store: memory_store,
        },
        pipeline,
    })
}

/// Run the server until Ctrl+C, then drain the queue.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;

    let Components { state, pipeline } = build_components(&config)?;
    let pipeline = pipeline.spawn();
    let app = api::router(state, config.request_timeout());

    info!(
        window = config.analysis.window_size,
        threshold = config.analysis.z_threshold,
        queue_capacity = config.ingest.queue_capacity,
        store_enabled = config.store.enabled,
        request_timeout_secs = config.server.request_timeout_secs,
        "Starting Loadsentry on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue handles; the pipeline now drains and stops.
    match pipeline.await {
        Ok(report) => info!(
            processed = report.processed,
            anomalies = report.anomalies,
            "Shutdown complete"
        ),
        Err(e) => error!("Analysis pipeline panicked: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining ingest queue");
}
