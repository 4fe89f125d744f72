//! Output module for crawl reports
//!
//! This module handles:
//! - Job statistics (entity counts, queue progress, status code breakdown)
//! - Redirect reports grouped by redirect kind and chain length

mod redirects;
pub mod stats;

pub use redirects::{build_redirect_report, print_redirect_report, RedirectKind, RedirectReport};
pub use stats::{load_statistics, print_statistics, JobStatistics};
