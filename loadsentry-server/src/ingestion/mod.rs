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

//! Ingestion - bounded queue and single-consumer analysis pipeline
//!
//! ## Architecture
//!
//! ```text
//! POST /ingest ─┬─► IngestQueue ──► Pipeline ──► Analyzer (write lock)
//!               │   (try_send,        │
//!               │    drop on full)    └──► forwarder ──► SideStore
//!               └─► 503 queue full        (bounded, timed)
//! ```
//!
//! Producers never block: a full queue rejects the sample immediately.
//! Exactly one pipeline task drains the queue, so samples are analyzed in
//! the order they were accepted.

mod pipeline;
mod queue;

pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use queue::{EnqueueError, IngestQueue, QueueReceiver};
