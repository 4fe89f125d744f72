//! Frontier management for a single crawl job
//!
//! The frontier lives entirely in the queue table: a URL is known to a job
//! exactly when a queue row exists for its normalized form. This module
//! wraps the storage calls with normalization and the queue item lifecycle:
//!
//! ```text
//! pending -> processing -> completed
//!                       -> failed
//! ```

use crate::state::QueueStatus;
use crate::storage::{QueueItem, QueueStats, Storage};
use crate::url::normalize_url;
use crate::{Result, SitescanError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed identity of a running crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlContext {
    pub job_id: i64,
    /// Lowercased host of the seed; the only host that counts as internal
    pub base_domain: String,
}

/// Locks the shared store, mapping a poisoned lock to an error
pub(crate) fn lock_storage<S>(storage: &Mutex<S>) -> Result<MutexGuard<'_, S>> {
    storage.lock().map_err(|_| SitescanError::LockPoisoned)
}

/// Queue manager bound to one job
pub struct Frontier<S> {
    storage: Arc<Mutex<S>>,
    context: Arc<CrawlContext>,
}

impl<S: Storage> Frontier<S> {
    pub fn new(storage: Arc<Mutex<S>>, context: Arc<CrawlContext>) -> Self {
        Self { storage, context }
    }

    pub fn context(&self) -> &CrawlContext {
        &self.context
    }

    /// Normalizes `url` and adds it unless the job already knows it
    ///
    /// # Returns
    ///
    /// `true` if a new queue item was created
    pub fn enqueue(&self, url: &str, depth: u32) -> Result<bool> {
        let normalized = normalize_url(url, &self.context.base_domain);
        let inserted =
            lock_storage(&self.storage)?.enqueue_if_absent(self.context.job_id, &normalized, depth)?;

        if inserted {
            tracing::debug!(job_id = self.context.job_id, url = %normalized, depth, "Enqueued");
        }
        Ok(inserted)
    }

    /// Claims up to `limit` pending items, oldest first
    ///
    /// An empty batch means the frontier is drained.
    pub fn claim_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let items = lock_storage(&self.storage)?.claim_pending(self.context.job_id, limit)?;
        Ok(items)
    }

    /// Marks a processing item completed
    pub fn complete(&self, item: &QueueItem) -> Result<()> {
        self.transition(item, QueueStatus::Completed)
    }

    /// Marks a processing item failed and bumps its retry count
    ///
    /// Failed items stay failed; they are not put back into the queue.
    pub fn fail(&self, item: &QueueItem) -> Result<()> {
        self.transition(item, QueueStatus::Failed)?;
        lock_storage(&self.storage)?.increment_retry(item.id)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let stats = lock_storage(&self.storage)?.queue_stats(self.context.job_id)?;
        Ok(stats)
    }

    fn transition(&self, item: &QueueItem, next: QueueStatus) -> Result<()> {
        if !item.status.can_transition_to(next) {
            return Err(SitescanError::InvalidTransition {
                from: item.status,
                to: next,
            });
        }

        lock_storage(&self.storage)?.set_queue_item_status(item.id, next)?;
        Ok(())
    }
}
