//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Crawl job lifecycle and aggregate statistics
//! - Frontier queue management (enqueue, atomic claim, status updates)
//! - Page, link, image and script persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{JobStatus, QueueStatus};

/// Aggregate entity counts for a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub pages: u64,
    pub links: u64,
    pub images: u64,
    pub scripts: u64,
}

/// Represents a crawl job in the database
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub domain: String,
    pub status: JobStatus,
    pub totals: JobCounts,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// A frontier entry: one normalized URL of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub depth: u32,
    pub status: QueueStatus,
    pub retry_count: u32,
}

/// Queue item counts by status for a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Mutable fields written on every page (re)fetch
#[derive(Debug, Clone, Default)]
pub struct PageFields {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub status_code: u16,
    pub content_type: String,
    pub redirect_url: Option<String>,
    pub redirect_count: u32,
    pub favicon_url: Option<String>,
}

/// Represents a fetched page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub redirect_url: Option<String>,
    pub redirect_count: u32,
    pub favicon_url: Option<String>,
    pub crawled_at: Option<String>,
}

/// An anchor extracted from a page, ready to be stored
#[derive(Debug, Clone)]
pub struct NewLink {
    pub page_id: i64,
    pub job_id: i64,
    pub source_url: String,
    pub target_url: String,
    pub link_text: String,
    pub is_nofollow: bool,
    pub is_internal: bool,
}

/// Represents a stored link edge
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub id: i64,
    pub page_id: i64,
    pub job_id: i64,
    pub source_url: String,
    pub target_url: String,
    pub link_text: Option<String>,
    pub is_nofollow: bool,
    pub is_internal: bool,
}

/// An image reference seen for the first time in a job
#[derive(Debug, Clone)]
pub struct NewImage {
    pub job_id: i64,
    pub page_id: i64,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_responsive: bool,
}

/// An external script reference seen for the first time in a job
#[derive(Debug, Clone)]
pub struct NewScript {
    pub job_id: i64,
    pub page_id: i64,
    pub url: String,
    pub script_type: Option<String>,
    pub is_async: bool,
    pub is_defer: bool,
}

/// Response metadata gathered for an image or script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMetadata {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub file_size: Option<u64>,
    pub redirect_count: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Represents a stored image asset
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: i64,
    pub job_id: i64,
    pub page_id: i64,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_responsive: bool,
    pub metadata: AssetMetadata,
}

/// Represents a stored script asset
#[derive(Debug, Clone)]
pub struct ScriptRecord {
    pub id: i64,
    pub job_id: i64,
    pub page_id: i64,
    pub url: String,
    pub script_type: Option<String>,
    pub is_async: bool,
    pub is_defer: bool,
    pub metadata: AssetMetadata,
}
