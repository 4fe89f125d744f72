//! Redirect reporting
//!
//! Pages reached through redirects are grouped by the status of the first
//! response. Chains longer than the configured threshold are flagged as
//! excessive; the threshold only affects this report, never crawling.

use crate::storage::{PageRecord, Storage};
use crate::Result;

/// Redirect classification by status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectKind {
    /// 301 and 308
    Permanent,
    /// 302, 303 and 307
    Temporary,
    /// Any other status that still ended in a redirect chain
    Other,
}

impl RedirectKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            301 | 308 => RedirectKind::Permanent,
            302 | 303 | 307 => RedirectKind::Temporary,
            _ => RedirectKind::Other,
        }
    }
}

/// Redirected pages of one job, grouped for display
#[derive(Debug, Clone, Default)]
pub struct RedirectReport {
    pub permanent: Vec<PageRecord>,
    pub temporary: Vec<PageRecord>,
    pub other: Vec<PageRecord>,
    /// Pages whose chain is longer than the threshold
    pub excessive: Vec<PageRecord>,
    pub threshold: u32,
}

impl RedirectReport {
    pub fn total(&self) -> usize {
        self.permanent.len() + self.temporary.len() + self.other.len()
    }
}

/// Builds the redirect report for a job
pub fn build_redirect_report<S: Storage + ?Sized>(
    storage: &S,
    job_id: i64,
    threshold: u32,
) -> Result<RedirectReport> {
    let mut report = RedirectReport {
        threshold,
        ..Default::default()
    };

    for page in storage.list_redirects(job_id)? {
        if page.redirect_count > threshold {
            report.excessive.push(page.clone());
        }

        match RedirectKind::from_status(page.status_code.unwrap_or(0)) {
            RedirectKind::Permanent => report.permanent.push(page),
            RedirectKind::Temporary => report.temporary.push(page),
            RedirectKind::Other => report.other.push(page),
        }
    }

    Ok(report)
}

fn print_group(title: &str, pages: &[PageRecord]) {
    if pages.is_empty() {
        return;
    }

    println!("{} ({}):", title, pages.len());
    for page in pages {
        println!(
            "  {} -> {} [{} hop{}]",
            page.url,
            page.redirect_url.as_deref().unwrap_or("?"),
            page.redirect_count,
            if page.redirect_count == 1 { "" } else { "s" }
        );
    }
    println!();
}

/// Prints a redirect report to stdout
pub fn print_redirect_report(report: &RedirectReport) {
    println!("=== Redirects ===\n");

    if report.total() == 0 {
        println!("No redirects recorded.");
        return;
    }

    print_group("Permanent (301/308)", &report.permanent);
    print_group("Temporary (302/303/307)", &report.temporary);
    print_group("Other", &report.other);
    print_group(
        &format!("Excessive chains (more than {} hops)", report.threshold),
        &report.excessive,
    );
}
