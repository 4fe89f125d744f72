//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `QueueStatus`: lifecycle of a single frontier item (pending, processing, completed, failed)
//! - `JobStatus`: lifecycle of a whole crawl job

mod job_status;
mod queue_status;

// Re-export main types
pub use job_status::JobStatus;
pub use queue_status::QueueStatus;
