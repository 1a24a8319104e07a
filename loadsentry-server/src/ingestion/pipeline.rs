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

use loadsentry_core::{Analyzer, Sample, Verdict};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::queue::QueueReceiver;
use crate::metrics::PipelineCounters;
use crate::store::SideStore;

/// Tuning for the side store forwarder.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pending store writes; when full, new writes are dropped.
    pub forward_capacity: usize,
    /// Upper bound on a single store write.
    pub forward_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            forward_capacity: 1024,
            forward_timeout: Duration::from_millis(500),
        }
    }
}

/// Totals returned when the pipeline stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub processed: u64,
    pub anomalies: u64,
    /// Store writes dropped because the forwarder was saturated.
    pub forwards_dropped: u64,
}

/// The single consumer of the ingest queue.
///
/// Owns the [`QueueReceiver`], so only one pipeline can exist per queue.
/// Store writes go through a bounded forwarder task and can never delay
/// analysis of the next sample.
pub struct Pipeline {
    analyzer: Arc<Analyzer>,
    receiver: QueueReceiver,
    counters: Arc<dyn PipelineCounters>,
    store: Arc<dyn SideStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        analyzer: Arc<Analyzer>,
        receiver: QueueReceiver,
        counters: Arc<dyn PipelineCounters>,
        store: Arc<dyn SideStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            analyzer,
            receiver,
            counters,
            store,
            config,
        }
    }

    /// Run the pipeline on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<PipelineReport> {
        tokio::spawn(self.run())
    }

    /// Process samples until every queue handle is dropped and the buffer is
    /// empty, then wait for outstanding store writes.
    pub async fn run(mut self) -> PipelineReport {
        let (forward_tx, forward_rx) = mpsc::channel(self.config.forward_capacity.max(1));
        let forwarder = tokio::spawn(forward_loop(
            forward_rx,
            self.store.clone(),
            self.counters.clone(),
            self.config.forward_timeout,
        ));

        info!(
            store = self.store.name(),
            window = self.analyzer.window_size(),
            threshold = self.analyzer.threshold(),
            "Analysis pipeline started"
        );

        let mut report = PipelineReport::default();

        while let Some(sample) = self.receiver.recv().await {
            let verdict = self.analyzer.process(sample);
            report.processed += 1;

            if verdict.anomaly {
                report.anomalies += 1;
                self.counters.anomaly_detected();
                info!(
                    rps = sample.rps,
                    rps_z = verdict.rps_z,
                    rps_avg = verdict.rps_avg,
                    "Anomaly detected"
                );
            }

            // Store the sample with the timestamp the analyzer settled on.
            let stored = Sample {
                timestamp: verdict.timestamp,
                ..sample
            };
            if let Err(e) = forward_tx.try_send((stored, verdict)) {
                report.forwards_dropped += 1;
                self.counters.store_failed();
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!("Side store forwarder full, dropping write")
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        warn!("Side store forwarder stopped, dropping write")
                    }
                }
            }
        }

        drop(forward_tx);
        if let Err(e) = forwarder.await {
            warn!("Side store forwarder ended abnormally: {}", e);
        }

        info!(
            processed = report.processed,
            anomalies = report.anomalies,
            forwards_dropped = report.forwards_dropped,
            "Analysis pipeline stopped"
        );
        report
    }
}

async fn forward_loop(
    mut rx: mpsc::Receiver<(Sample, Verdict)>,
    store: Arc<dyn SideStore>,
    counters: Arc<dyn PipelineCounters>,
    write_timeout: Duration,
) {
    while let Some((sample, verdict)) = rx.recv().await {
        match tokio::time::timeout(write_timeout, store.record(&sample, &verdict)).await {
            Ok(Ok(())) => debug!(count = verdict.count, "Recorded sample"),
            Ok(Err(e)) => {
                counters.store_failed();
                warn!(store = store.name(), "Side store write failed: {}", e);
            }
            Err(_) => {
                counters.store_failed();
                warn!(
                    store = store.name(),
                    timeout_ms = write_timeout.as_millis() as u64,
                    "Side store write timed out"
                );
            }
        }
    }
}
