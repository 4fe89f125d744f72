//! Storage traits and error types
//!
//! This module defines the narrow interface the crawl engine reads and writes
//! through, and the associated error types.

use crate::state::{JobStatus, QueueStatus};
use crate::storage::{
    AssetMetadata, ImageRecord, JobCounts, JobRecord, LinkRecord, NewImage, NewLink, NewScript,
    PageFields, PageRecord, QueueItem, QueueStats, ScriptRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Crawl job not found: {0}")]
    JobNotFound(i64),

    #[error("Queue item not found: {0}")]
    QueueItemNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Duplicate keys on enqueue and asset inserts are an expected outcome and
/// are reported through the return value, never as an error. All statements
/// must be parameterized.
pub trait Storage {
    // ===== Job Management =====

    /// Creates a new pending crawl job for `domain`
    fn create_job(&mut self, domain: &str) -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>>;

    /// Updates the status of a job
    ///
    /// Moving to `Running` stamps `started_at`; moving to a terminal status
    /// stamps `completed_at`.
    fn set_job_status(&mut self, job_id: i64, status: JobStatus) -> StorageResult<()>;

    /// Recomputes the job's aggregate counts from persisted rows
    fn recompute_job_stats(&mut self, job_id: i64) -> StorageResult<JobCounts>;

    /// Deletes every crawled row of a job and sets it back to pending
    fn reset_job(&mut self, job_id: i64) -> StorageResult<()>;

    /// Deletes a job and all of its rows
    fn delete_job(&mut self, job_id: i64) -> StorageResult<()>;

    // ===== Frontier Management =====

    /// Inserts a queue item unless one exists for (job, url)
    ///
    /// # Returns
    ///
    /// `true` if a new item was inserted, `false` for a duplicate
    fn enqueue_if_absent(&mut self, job_id: i64, url: &str, depth: u32) -> StorageResult<bool>;

    /// Atomically moves up to `limit` pending items to processing and returns them
    ///
    /// Items are claimed oldest first. An empty result means the frontier is drained.
    fn claim_pending(&mut self, job_id: i64, limit: usize) -> StorageResult<Vec<QueueItem>>;

    /// Sets the status of a queue item
    fn set_queue_item_status(&mut self, item_id: i64, status: QueueStatus) -> StorageResult<()>;

    /// Increments the retry count of a queue item
    fn increment_retry(&mut self, item_id: i64) -> StorageResult<()>;

    /// Counts a job's queue items by status
    fn queue_stats(&self, job_id: i64) -> StorageResult<QueueStats>;

    /// Lists a job's queue items in discovery order
    fn list_queue(&self, job_id: i64) -> StorageResult<Vec<QueueItem>>;

    // ===== Page Management =====

    /// Inserts a page or overwrites its mutable fields
    ///
    /// # Returns
    ///
    /// The page ID, identical across repeated upserts of the same (job, url)
    fn upsert_page(&mut self, job_id: i64, page: &PageFields) -> StorageResult<i64>;

    /// Gets a page by URL
    fn get_page_by_url(&self, job_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Lists a job's pages
    fn list_pages(&self, job_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Lists a job's pages that were reached through at least one redirect
    fn list_redirects(&self, job_id: i64) -> StorageResult<Vec<PageRecord>>;

    // ===== Link Management =====

    /// Appends a link edge
    fn insert_link(&mut self, link: &NewLink) -> StorageResult<i64>;

    /// Lists a job's links
    fn list_links(&self, job_id: i64) -> StorageResult<Vec<LinkRecord>>;

    // ===== Asset Management =====

    /// Inserts an image unless one exists for (job, url)
    ///
    /// # Returns
    ///
    /// `Some(id)` for a newly inserted image, `None` if it was already known
    fn insert_image_if_new(&mut self, image: &NewImage) -> StorageResult<Option<i64>>;

    /// Stores probed response metadata for an image
    fn update_image_metadata(&mut self, image_id: i64, metadata: &AssetMetadata)
        -> StorageResult<()>;

    /// Lists a job's images
    fn list_images(&self, job_id: i64) -> StorageResult<Vec<ImageRecord>>;

    /// Inserts a script unless one exists for (job, url)
    fn insert_script_if_new(&mut self, script: &NewScript) -> StorageResult<Option<i64>>;

    /// Stores probed response metadata for a script
    fn update_script_metadata(
        &mut self,
        script_id: i64,
        metadata: &AssetMetadata,
    ) -> StorageResult<()>;

    /// Lists a job's scripts
    fn list_scripts(&self, job_id: i64) -> StorageResult<Vec<ScriptRecord>>;

    // ===== Statistics =====

    /// Counts a job's persisted entities without touching the job row
    fn count_entities(&self, job_id: i64) -> StorageResult<JobCounts>;
}
