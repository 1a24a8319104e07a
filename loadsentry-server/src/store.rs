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

//! Side store for processed samples
//!
//! Writes are best effort. The pipeline hands every `(sample, verdict)` pair
//! to a [`SideStore`] off the analysis path; a failing store is logged and
//! counted but never affects the verdict.

use async_trait::async_trait;
use loadsentry_core::{Sample, Verdict};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Default number of entries retained by [`MemoryStore`].
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("side store unavailable: {0}")]
    Unavailable(String),
}

/// Destination for processed samples and their verdicts.
#[async_trait]
pub trait SideStore: Send + Sync {
    async fn record(&self, sample: &Sample, verdict: &Verdict) -> Result<(), StoreError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// A stored sample together with the verdict it produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub sample: Sample,
    pub verdict: Verdict,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Newest first.
    recent: VecDeque<StoredEntry>,
    last: Option<StoredEntry>,
}

/// In-process store keeping a bounded recent history and the latest entry.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
    history_limit: usize,
}

impl MemoryStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner::default()),
            history_limit,
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<StoredEntry> {
        self.inner.lock().recent.iter().take(limit).copied().collect()
    }

    /// Most recently recorded entry.
    pub fn last_entry(&self) -> Option<StoredEntry> {
        self.inner.lock().last
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.inner.lock().last.map(|e| e.sample)
    }

    pub fn last_verdict(&self) -> Option<Verdict> {
        self.inner.lock().last.map(|e| e.verdict)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().recent.is_empty()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl SideStore for MemoryStore {
    async fn record(&self, sample: &Sample, verdict: &Verdict) -> Result<(), StoreError> {
        let entry = StoredEntry {
            sample: *sample,
            verdict: *verdict,
        };
        let mut inner = self.inner.lock();
        inner.recent.push_front(entry);
        inner.recent.truncate(self.history_limit);
        inner.last = Some(entry);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store used when persistence is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl SideStore for NullStore {
    async fn record(&self, _sample: &Sample, _verdict: &Verdict) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
