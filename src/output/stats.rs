//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! per-job crawl statistics from the storage layer.

use crate::storage::{JobCounts, JobRecord, QueueStats, Storage};
use crate::{Result, SitescanError};
use std::collections::BTreeMap;

/// Crawl statistics for one job
#[derive(Debug, Clone)]
pub struct JobStatistics {
    /// The job row, including its stored counters
    pub job: JobRecord,

    /// Counts computed live from persisted rows
    pub live_counts: JobCounts,

    /// Queue items by status
    pub queue: QueueStats,

    /// Pages by first response status code
    pub status_codes: BTreeMap<u16, u64>,

    /// Wall-clock crawl duration, once the job has finished
    pub duration_seconds: Option<i64>,
}

impl JobStatistics {
    /// Share of finished queue items that completed, in percent
    pub fn success_rate(&self) -> f64 {
        let finished = self.queue.completed + self.queue.failed;
        if finished == 0 {
            return 0.0;
        }
        self.queue.completed as f64 / finished as f64 * 100.0
    }
}

/// Loads statistics for a job
///
/// # Errors
///
/// Returns [`SitescanError::JobNotFound`] for an unknown job.
pub fn load_statistics<S: Storage + ?Sized>(storage: &S, job_id: i64) -> Result<JobStatistics> {
    let job = storage
        .get_job(job_id)?
        .ok_or(SitescanError::JobNotFound(job_id))?;

    let live_counts = storage.count_entities(job_id)?;
    let queue = storage.queue_stats(job_id)?;

    let mut status_codes = BTreeMap::new();
    for page in storage.list_pages(job_id)? {
        if let Some(code) = page.status_code {
            *status_codes.entry(code).or_insert(0) += 1;
        }
    }

    let duration_seconds = match (&job.started_at, &job.completed_at) {
        (Some(started), Some(completed)) => {
            let started = chrono::DateTime::parse_from_rfc3339(started).ok();
            let completed = chrono::DateTime::parse_from_rfc3339(completed).ok();
            started
                .zip(completed)
                .map(|(started, completed)| (completed - started).num_seconds())
        }
        _ => None,
    };

    Ok(JobStatistics {
        job,
        live_counts,
        queue,
        status_codes,
        duration_seconds,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &JobStatistics) {
    let job = &stats.job;

    println!("=== Crawl Job {} ===\n", job.id);

    println!("Overview:");
    println!("  Domain: {}", job.domain);
    println!("  Status: {}", job.status);
    println!("  Created: {}", job.created_at);
    if let Some(started) = &job.started_at {
        println!("  Started: {}", started);
    }
    if let Some(completed) = &job.completed_at {
        println!("  Completed: {}", completed);
    }
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!();

    println!("Totals:");
    println!("  Pages: {}", stats.live_counts.pages);
    println!("  Links: {}", stats.live_counts.links);
    println!("  Images: {}", stats.live_counts.images);
    println!("  Scripts: {}", stats.live_counts.scripts);
    println!();

    println!("Queue:");
    println!("  Total: {}", stats.queue.total);
    println!("  Pending: {}", stats.queue.pending);
    println!("  Processing: {}", stats.queue.processing);
    println!("  Completed: {}", stats.queue.completed);
    println!("  Failed: {}", stats.queue.failed);
    println!();

    if !stats.status_codes.is_empty() {
        println!("Status Codes:");
        for (code, count) in &stats.status_codes {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    println!("Success rate: {:.1}%", stats.success_rate());
}
