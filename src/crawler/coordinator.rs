//! Crawl coordinator
//!
//! This module drives one crawl job from seed to completion. Work proceeds in
//! batches: claim up to `concurrency` pending queue items, fetch and handle
//! them concurrently, and only claim the next batch once every handler of the
//! current one has finished.

use crate::config::Config;
use crate::crawler::assets::AssetProber;
use crate::crawler::extractor::{extract, ExtractedPage};
use crate::crawler::fetcher::{FetchedPage, Fetcher};
use crate::crawler::frontier::{lock_storage, CrawlContext, Frontier};
use crate::state::JobStatus;
use crate::storage::{NewImage, NewLink, NewScript, PageFields, QueueItem, Storage};
use crate::url::{base_domain, seed_url, AssetKind};
use crate::{Result, SitescanError};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use url::Url;

/// Concurrent asset probes per page
const ASSET_PROBE_CONCURRENCY: usize = 4;

/// Main crawl coordinator
///
/// Holds everything a running job needs: the shared store, the fixed crawl
/// context, and the HTTP machinery.
pub struct Coordinator<S> {
    config: Arc<Config>,
    storage: Arc<Mutex<S>>,
    frontier: Frontier<S>,
    fetcher: Fetcher,
    prober: AssetProber,
    seed: Url,
}

impl<S: Storage> Coordinator<S> {
    /// Creates a coordinator for an existing job
    ///
    /// # Errors
    ///
    /// Fails if the job does not exist, the seed is not a usable http(s) URL,
    /// or the HTTP client cannot be built.
    pub fn new(storage: Arc<Mutex<S>>, config: Config, job_id: i64, seed: &str) -> Result<Self> {
        if lock_storage(&storage)?.get_job(job_id)?.is_none() {
            return Err(SitescanError::JobNotFound(job_id));
        }

        let seed = seed_url(seed)?;
        let context = Arc::new(CrawlContext {
            job_id,
            base_domain: base_domain(&seed)?,
        });

        let fetcher = Fetcher::new(&config.http)?;

        Ok(Self {
            config: Arc::new(config),
            frontier: Frontier::new(storage.clone(), context),
            storage,
            prober: AssetProber::new(fetcher.clone()),
            fetcher,
            seed,
        })
    }

    pub fn context(&self) -> &CrawlContext {
        self.frontier.context()
    }

    /// Runs the crawl loop until the frontier is drained
    ///
    /// Storage errors abort the loop and are returned; fetch errors only fail
    /// the affected queue item.
    pub async fn run(&self) -> Result<()> {
        let job_id = self.context().job_id;
        let concurrency = self.config.crawler.concurrency.max(1);

        tracing::info!(
            job_id,
            seed = %self.seed,
            base_domain = %self.context().base_domain,
            "Starting crawl"
        );

        lock_storage(&self.storage)?.set_job_status(job_id, JobStatus::Running)?;
        self.frontier.enqueue(self.seed.as_str(), 0)?;

        let start_time = Instant::now();
        let mut pages_processed: u64 = 0;

        loop {
            let batch = self.frontier.claim_batch(concurrency)?;
            if batch.is_empty() {
                tracing::info!(job_id, "Frontier is empty, crawl complete");
                break;
            }

            let batch_size = batch.len() as u64;
            let results: Vec<Result<()>> = stream::iter(batch)
                .map(|item| self.process_item(item))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for result in results {
                result?;
            }

            pages_processed += batch_size;
            self.report_progress(pages_processed, start_time)?;
        }

        lock_storage(&self.storage)?.recompute_job_stats(job_id)?;
        lock_storage(&self.storage)?.set_job_status(job_id, JobStatus::Completed)?;

        tracing::info!(
            job_id,
            pages_processed,
            elapsed = ?start_time.elapsed(),
            "Crawl completed"
        );

        Ok(())
    }

    /// Fetches one queue item and routes it to the success or failure handler
    async fn process_item(&self, item: QueueItem) -> Result<()> {
        let url = match Url::parse(&item.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(job_id = item.job_id, url = %item.url, error = %e, "Unfetchable queue URL");
                return self.frontier.fail(&item);
            }
        };

        tracing::debug!(job_id = item.job_id, url = %url, depth = item.depth, "Fetching");

        match self.fetcher.fetch(&url).await {
            Ok(page) => self.handle_page(&item, page).await,
            Err(e) => {
                tracing::warn!(job_id = item.job_id, url = %url, error = %e, "Fetch failed");
                self.frontier.fail(&item)
            }
        }
    }

    /// Records a fetched page with its links and assets, then schedules its internal links
    async fn handle_page(&self, item: &QueueItem, page: FetchedPage) -> Result<()> {
        let context = self.context();

        let extracted = if page.is_html() {
            extract(&page.body, &page.final_url, &context.base_domain)
        } else {
            ExtractedPage::default()
        };

        let redirect_count = page.redirect_count();
        let fields = PageFields {
            url: item.url.clone(),
            title: extracted.title.clone(),
            meta_description: extracted.meta_description.clone(),
            status_code: page.status_code(),
            content_type: page.content_type.clone(),
            redirect_url: (redirect_count > 0).then(|| page.final_url.to_string()),
            redirect_count,
            favicon_url: extracted.favicon_url.clone(),
        };

        let mut new_assets = Vec::new();
        {
            let mut storage = lock_storage(&self.storage)?;
            let page_id = storage.upsert_page(context.job_id, &fields)?;

            for link in &extracted.links {
                storage.insert_link(&NewLink {
                    page_id,
                    job_id: context.job_id,
                    source_url: item.url.clone(),
                    target_url: link.url.to_string(),
                    link_text: link.text.clone(),
                    is_nofollow: link.is_nofollow,
                    is_internal: link.is_internal,
                })?;
            }

            for image in &extracted.images {
                let inserted = storage.insert_image_if_new(&NewImage {
                    job_id: context.job_id,
                    page_id,
                    url: image.url.to_string(),
                    alt_text: image.alt_text.clone(),
                    is_responsive: image.is_responsive,
                })?;
                if let Some(id) = inserted {
                    new_assets.push((id, image.url.clone(), AssetKind::Image));
                }
            }

            for script in &extracted.scripts {
                let inserted = storage.insert_script_if_new(&NewScript {
                    job_id: context.job_id,
                    page_id,
                    url: script.url.to_string(),
                    script_type: script.script_type.clone(),
                    is_async: script.is_async,
                    is_defer: script.is_defer,
                })?;
                if let Some(id) = inserted {
                    new_assets.push((id, script.url.clone(), AssetKind::Script));
                }
            }
        }

        if self.config.crawler.probe_assets && !new_assets.is_empty() {
            self.probe_assets(new_assets).await?;
        }

        if item.depth < self.config.crawler.max_depth {
            let follow_nofollow = self.config.crawler.follow_nofollow;
            for link in &extracted.links {
                if link.is_internal && (follow_nofollow || !link.is_nofollow) {
                    self.frontier.enqueue(link.url.as_str(), item.depth + 1)?;
                }
            }
        }

        tracing::debug!(
            job_id = context.job_id,
            url = %item.url,
            status = fields.status_code,
            links = extracted.links.len(),
            "Page recorded"
        );

        self.frontier.complete(item)
    }

    /// Fetches metadata for newly stored assets and writes it back
    async fn probe_assets(&self, assets: Vec<(i64, Url, AssetKind)>) -> Result<()> {
        let probed: Vec<_> = stream::iter(assets)
            .map(|(id, url, kind)| async move {
                let metadata = self.prober.probe(&url, kind).await;
                (id, kind, metadata)
            })
            .buffer_unordered(ASSET_PROBE_CONCURRENCY)
            .collect()
            .await;

        let mut storage = lock_storage(&self.storage)?;
        for (id, kind, metadata) in probed {
            match kind {
                AssetKind::Image => storage.update_image_metadata(id, &metadata)?,
                AssetKind::Script => storage.update_script_metadata(id, &metadata)?,
            }
        }
        Ok(())
    }

    /// Refreshes the job counters and logs crawl progress
    fn report_progress(&self, pages_processed: u64, start_time: Instant) -> Result<()> {
        let job_id = self.context().job_id;
        let counts = lock_storage(&self.storage)?.recompute_job_stats(job_id)?;
        let queue = self.frontier.stats()?;

        let rate = pages_processed as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            job_id,
            pages = counts.pages,
            pending = queue.pending,
            failed = queue.failed,
            "Progress: {} queue items processed, {:.2} items/sec",
            pages_processed,
            rate
        );

        Ok(())
    }
}

/// Runs a complete crawl of an existing job
///
/// This is the main entry point for the crawl engine. The job must already
/// exist in `storage`; `seed` is the domain or URL the crawl starts from.
///
/// # Returns
///
/// The job's final status. Any failure before or during the loop is recorded
/// by marking the job failed and returning [`JobStatus::Failed`]. An `Err` is
/// returned only when even that cannot be recorded.
///
/// # Example
///
/// ```no_run
/// use sitescan::storage::{SqliteStorage, Storage};
/// use sitescan::{run_crawl, Config};
/// use std::sync::{Arc, Mutex};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut storage = SqliteStorage::open_in_memory()?;
/// let job_id = storage.create_job("example.com")?;
/// let storage = Arc::new(Mutex::new(storage));
///
/// let status = run_crawl(storage, Config::default(), job_id, "example.com").await?;
/// println!("Crawl finished: {}", status);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl<S: Storage>(
    storage: Arc<Mutex<S>>,
    config: Config,
    job_id: i64,
    seed: &str,
) -> Result<JobStatus> {
    let outcome = match Coordinator::new(storage.clone(), config, job_id, seed) {
        Ok(coordinator) => coordinator.run().await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => Ok(JobStatus::Completed),
        Err(SitescanError::JobNotFound(id)) => {
            tracing::error!(job_id = id, "Crawl job not found");
            Ok(JobStatus::Failed)
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Crawl failed");
            let mut store = lock_storage(&storage)?;
            if let Err(stats_error) = store.recompute_job_stats(job_id) {
                tracing::warn!(job_id, error = %stats_error, "Could not refresh job counts");
            }
            store.set_job_status(job_id, JobStatus::Failed)?;
            Ok(JobStatus::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn shared_storage() -> (Arc<Mutex<SqliteStorage>>, i64) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let job_id = storage.create_job("example.com").unwrap();
        (Arc::new(Mutex::new(storage)), job_id)
    }

    #[test]
    fn test_coordinator_creation() {
        let (storage, job_id) = shared_storage();
        let coordinator =
            Coordinator::new(storage, Config::default(), job_id, "WWW.Example.com").unwrap();

        assert_eq!(coordinator.context().job_id, job_id);
        assert_eq!(coordinator.context().base_domain, "www.example.com");
        assert_eq!(coordinator.seed.as_str(), "https://www.example.com/");
    }

    fn html_page(url: &str, body: &str) -> FetchedPage {
        FetchedPage {
            final_url: Url::parse(url).unwrap(),
            final_status: 200,
            content_type: "text/html".to_string(),
            body: body.to_string(),
            redirect_chain: Vec::new(),
        }
    }

    /// Handles a page holding one internal link from an item at `depth`
    async fn enqueued_from_depth(depth: u32) -> Vec<QueueItem> {
        let (storage, job_id) = shared_storage();
        let config = Config::default();
        assert_eq!(config.crawler.max_depth, 50);

        let coordinator = Coordinator::new(storage.clone(), config, job_id, "example.com").unwrap();
        coordinator
            .frontier
            .enqueue("https://example.com/deep", depth)
            .unwrap();
        let item = coordinator.frontier.claim_batch(1).unwrap().remove(0);

        let page = html_page(
            "https://example.com/deep",
            r#"<a href="/deeper">Deeper</a>"#,
        );
        coordinator.handle_page(&item, page).await.unwrap();

        let queue = storage.lock().unwrap().list_queue(job_id).unwrap();
        queue
    }

    #[tokio::test]
    async fn test_no_enqueue_from_default_max_depth() {
        let queue = enqueued_from_depth(50).await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, crate::state::QueueStatus::Completed);
    }

    #[tokio::test]
    async fn test_enqueue_below_default_max_depth() {
        let queue = enqueued_from_depth(49).await;
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].url, "https://example.com/deeper");
        assert_eq!(queue[1].depth, 50);
    }

    #[test]
    fn test_coordinator_rejects_missing_job() {
        let (storage, _) = shared_storage();
        let result = Coordinator::new(storage, Config::default(), 999, "example.com");
        assert!(matches!(result, Err(SitescanError::JobNotFound(999))));
    }

    #[tokio::test]
    async fn test_run_crawl_missing_job_reports_failed() {
        let (storage, _) = shared_storage();
        let status = run_crawl(storage, Config::default(), 999, "example.com")
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_crawl_invalid_seed_marks_job_failed() {
        let (storage, job_id) = shared_storage();
        let status = run_crawl(storage.clone(), Config::default(), job_id, "https://")
            .await
            .unwrap();

        assert_eq!(status, JobStatus::Failed);
        let job = storage.lock().unwrap().get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }
}
