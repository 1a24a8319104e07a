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

use loadsentry_core::Sample;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::metrics::PipelineCounters;

/// Why a sample was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue is at capacity; the sample was dropped.
    #[error("queue full")]
    QueueFull,

    /// The consumer is gone (shutdown in progress).
    #[error("ingest queue closed")]
    Closed,
}

/// Producer side of the bounded ingest queue. Cheap to clone.
#[derive(Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<Sample>,
    counters: Arc<dyn PipelineCounters>,
    capacity: usize,
}

/// Consumer side of the ingest queue. Not cloneable, so at most one
/// pipeline can own it.
pub struct QueueReceiver {
    receiver: mpsc::Receiver<Sample>,
}

impl IngestQueue {
    /// Create a queue holding at most `capacity` pending samples.
    pub fn bounded(
        capacity: NonZeroUsize,
        counters: Arc<dyn PipelineCounters>,
    ) -> (Self, QueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.get());
        (
            Self {
                sender,
                counters,
                capacity: capacity.get(),
            },
            QueueReceiver { receiver },
        )
    }

    /// Try to queue a sample without waiting.
    ///
    /// On success the accepted counter is incremented. When the queue is full
    /// the sample is discarded and [`EnqueueError::QueueFull`] returned; the
    /// caller is expected to surface that as a rejection, not retry.
    pub fn enqueue(&self, sample: Sample) -> Result<(), EnqueueError> {
        match self.sender.try_send(sample) {
            Ok(()) => {
                self.counters.sample_accepted();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.sample_rejected();
                Err(EnqueueError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples currently waiting for the consumer.
    pub fn depth(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl QueueReceiver {
    /// Wait for the next sample. Returns `None` once every [`IngestQueue`]
    /// handle has been dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.receiver.recv().await
    }

    /// Stop accepting new samples; already queued ones can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AtomicCounters, CounterSnapshot};

    fn queue(capacity: usize) -> (IngestQueue, QueueReceiver, Arc<AtomicCounters>) {
        let counters = Arc::new(AtomicCounters::new());
        let (q, rx) = IngestQueue::bounded(NonZeroUsize::new(capacity).unwrap(), counters.clone());
        (q, rx, counters)
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        let (q, _rx, counters) = queue(4);
        for i in 0..4 {
            assert_eq!(q.enqueue(Sample::from_rps(i as f64)), Ok(()));
        }
        assert_eq!(q.enqueue(Sample::from_rps(99.0)), Err(EnqueueError::QueueFull));

        let snap = counters.snapshot();
        assert_eq!(snap.accepted, 4);
        assert_eq!(snap.rejected, 1);
        assert_eq!(q.depth(), 4);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (q, mut rx, _) = queue(8);
        for v in [3.0, 1.0, 2.0] {
            q.enqueue(Sample::from_rps(v)).unwrap();
        }
        drop(q);

        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample.rps);
        }
        assert_eq!(seen, vec![3.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_clones_share_capacity() {
        let (q, _rx, _) = queue(2);
        let other = q.clone();
        q.enqueue(Sample::from_rps(1.0)).unwrap();
        other.enqueue(Sample::from_rps(2.0)).unwrap();
        assert_eq!(other.enqueue(Sample::from_rps(3.0)), Err(EnqueueError::QueueFull));
    }

    #[tokio::test]
    async fn test_space_frees_after_dequeue() {
        let (q, mut rx, _) = queue(1);
        q.enqueue(Sample::from_rps(1.0)).unwrap();
        assert_eq!(q.enqueue(Sample::from_rps(2.0)), Err(EnqueueError::QueueFull));
        assert_eq!(rx.recv().await.map(|s| s.rps), Some(1.0));
        assert_eq!(q.enqueue(Sample::from_rps(3.0)), Ok(()));
    }

    #[tokio::test]
    async fn test_closed_after_receiver_dropped() {
        let (q, rx, counters) = queue(2);
        drop(rx);
        assert!(q.is_closed());
        assert_eq!(q.enqueue(Sample::from_rps(1.0)), Err(EnqueueError::Closed));
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }

    #[tokio::test]
    async fn test_close_drains_pending() {
        let (q, mut rx, _) = queue(4);
        q.enqueue(Sample::from_rps(1.0)).unwrap();
        rx.close();
        assert_eq!(q.enqueue(Sample::from_rps(2.0)), Err(EnqueueError::Closed));
        assert_eq!(rx.recv().await.map(|s| s.rps), Some(1.0));
        assert!(rx.recv().await.is_none());
    }
}
