//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use sitescan::config::Config;
use sitescan::run_crawl;
use sitescan::state::{JobStatus, QueueStatus};
use sitescan::storage::{SqliteStorage, Storage};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short timeouts
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.concurrency = 4;
    config.http.request_timeout_secs = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

/// A 2x3 PNG: signature plus IHDR chunk
fn tiny_png() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&3u32.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Creates a job for the mock server and crawls it with an in-memory store
async fn crawl(server: &MockServer, config: Config) -> (Arc<Mutex<SqliteStorage>>, i64, JobStatus) {
    let mut storage = SqliteStorage::open_in_memory().expect("Failed to open storage");
    let job_id = storage
        .create_job(&server.uri())
        .expect("Failed to create job");
    let storage = Arc::new(Mutex::new(storage));

    let status = run_crawl(storage.clone(), config, job_id, &server.uri())
        .await
        .expect("Crawl returned an error");

    (storage, job_id, status)
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><head>
            <title>Home</title>
            <meta name="description" content="Welcome">
        </head><body>
            <a href="/about">About</a>
            <a href="https://external.example/" rel="nofollow">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/about",
        r#"<html><head><title>About</title></head><body><a href="/">Home</a></body></html>"#,
    )
    .await;

    let (storage, job_id, status) = crawl(&server, create_test_config()).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();

    let pages = storage.list_pages(job_id).unwrap();
    assert_eq!(pages.len(), 2);

    let home = storage
        .get_page_by_url(job_id, &format!("{}/", base))
        .unwrap()
        .expect("home page recorded");
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.meta_description.as_deref(), Some("Welcome"));
    assert_eq!(home.status_code, Some(200));
    assert_eq!(home.redirect_count, 0);
    assert_eq!(
        home.favicon_url.as_deref(),
        Some(format!("{}/favicon.ico", base).as_str())
    );

    let links = storage.list_links(job_id).unwrap();
    assert_eq!(links.len(), 3);

    let external = links
        .iter()
        .find(|link| link.target_url.starts_with("https://external.example"))
        .expect("external link recorded");
    assert!(!external.is_internal);
    assert!(external.is_nofollow);

    // The external link is recorded but never queued
    let queue = storage.list_queue(job_id).unwrap();
    assert_eq!(queue.len(), 2);
    assert!(queue
        .iter()
        .all(|item| item.status == QueueStatus::Completed));
    assert!(queue.iter().all(|item| !item.url.contains("external")));

    let job = storage.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(job.totals, storage.count_entities(job_id).unwrap());
    assert_eq!(job.totals.pages, 2);
    assert_eq!(job.totals.links, 3);
}

#[tokio::test]
async fn test_redirect_chain_recorded() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/old">Old page</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&server)
        .await;

    mount_page(&server, "/new", "<title>New</title>").await;

    let (storage, job_id, status) = crawl(&server, create_test_config()).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let old = storage
        .get_page_by_url(job_id, &format!("{}/old", base))
        .unwrap()
        .expect("redirected page recorded under its requested URL");

    assert_eq!(old.status_code, Some(301));
    assert_eq!(old.redirect_count, 1);
    assert_eq!(old.redirect_url, Some(format!("{}/new", base)));
    assert_eq!(old.title.as_deref(), Some("New"));

    let redirects = storage.list_redirects(job_id).unwrap();
    assert_eq!(redirects.len(), 1);
}

#[tokio::test]
async fn test_shared_image_probed_once() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<img src="/logo.png" alt="Logo"><a href="/about">About</a>"#,
    )
    .await;
    mount_page(&server, "/about", r#"<img src="/logo.png" srcset="/logo.png 2x">"#).await;

    Mock::given(method("HEAD"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(tiny_png(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(tiny_png(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let (storage, job_id, status) = crawl(&server, create_test_config()).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let images = storage.list_images(job_id).unwrap();
    assert_eq!(images.len(), 1);

    let image = &images[0];
    assert_eq!(image.metadata.status_code, Some(200));
    assert_eq!(image.metadata.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.metadata.width, Some(2));
    assert_eq!(image.metadata.height, Some(3));
    assert_eq!(image.metadata.redirect_count, 0);
}

#[tokio::test]
async fn test_scripts_recorded_and_probed() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<script src="/app.js" async></script><script src="/missing.js" defer></script>"#,
    )
    .await;

    Mock::given(method("HEAD"))
        .and(path("/app.js"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("console.log(1)", "application/javascript"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (storage, job_id, _) = crawl(&server, create_test_config()).await;

    let storage = storage.lock().unwrap();
    let scripts = storage.list_scripts(job_id).unwrap();
    assert_eq!(scripts.len(), 2);

    let app = scripts
        .iter()
        .find(|script| script.url.ends_with("/app.js"))
        .unwrap();
    assert!(app.is_async);
    assert_eq!(app.metadata.status_code, Some(200));

    let missing = scripts
        .iter()
        .find(|script| script.url.ends_with("/missing.js"))
        .unwrap();
    assert!(missing.is_defer);
    assert_eq!(missing.metadata.status_code, Some(404));
}

#[tokio::test]
async fn test_head_refused_partial_size_not_recorded() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<script src="/app.js"></script>"#).await;

    Mock::given(method("HEAD"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-0/*")
                .set_body_raw("c", "application/javascript"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (storage, job_id, _) = crawl(&server, create_test_config()).await;

    let storage = storage.lock().unwrap();
    let scripts = storage.list_scripts(job_id).unwrap();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].metadata.status_code, Some(206));
    assert_eq!(
        scripts[0].metadata.content_type.as_deref(),
        Some("application/javascript")
    );
    // Unknown range total: the one-byte slice is not the file size
    assert_eq!(scripts[0].metadata.file_size, None);
}

#[tokio::test]
async fn test_asset_links_are_not_pages() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/bundle.js">Bundle</a>
           <a href="/photo.JPG">Photo</a>
           <a href="/contact">Contact</a>"#,
    )
    .await;
    mount_page(&server, "/contact", "<title>Contact</title>").await;

    Mock::given(method("GET"))
        .and(path("/bundle.js"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (storage, job_id, status) = crawl(&server, create_test_config()).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let links = storage.list_links(job_id).unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].target_url.ends_with("/contact"));
    assert_eq!(storage.list_queue(job_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/level1">Level 1</a>"#).await;
    mount_page(&server, "/level1", r#"<a href="/level2">Level 2</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html("<title>Too deep</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.max_depth = 1;

    let (storage, job_id, status) = crawl(&server, config).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let queue = storage.list_queue(job_id).unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].depth, 0);
    assert_eq!(queue[1].depth, 1);

    // The link from the depth-limited page is still recorded
    let links = storage.list_links(job_id).unwrap();
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_nofollow_not_followed_when_disabled() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/private" rel="nofollow">Private</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(html("<title>Private</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.follow_nofollow = false;

    let (storage, job_id, _) = crawl(&server, config).await;

    let storage = storage.lock().unwrap();
    assert_eq!(storage.list_queue(job_id).unwrap().len(), 1);
    assert_eq!(storage.list_links(job_id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_statuses_recorded_as_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="/gone">Gone</a><a href="/report.pdf">Report</a>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;

    let (storage, job_id, status) = crawl(&server, create_test_config()).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();

    let gone = storage
        .get_page_by_url(job_id, &format!("{}/gone", base))
        .unwrap()
        .expect("404 page recorded");
    assert_eq!(gone.status_code, Some(404));

    let pdf = storage
        .get_page_by_url(job_id, &format!("{}/report.pdf", base))
        .unwrap()
        .expect("non-HTML page recorded");
    assert_eq!(pdf.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(pdf.title.as_deref(), Some(""));

    let stats = storage.queue_stats(job_id).unwrap();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_redirect_loop_fails_item_only() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/loop">Loop</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.http.max_redirects = 3;

    let (storage, job_id, status) = crawl(&server, config).await;
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let queue = storage.list_queue(job_id).unwrap();
    let looped = queue
        .iter()
        .find(|item| item.url.ends_with("/loop"))
        .unwrap();

    assert_eq!(looped.status, QueueStatus::Failed);
    assert_eq!(looped.retry_count, 1);
    assert_eq!(storage.list_pages(job_id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_recrawl_replaces_previous_data() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/a">A</a><img src="/x.png">"#).await;
    mount_page(&server, "/a", r#"<a href="/">Home</a>"#).await;

    let mut config = create_test_config();
    config.crawler.probe_assets = false;

    let (storage, job_id, _) = crawl(&server, config.clone()).await;
    let first = storage.lock().unwrap().count_entities(job_id).unwrap();

    storage.lock().unwrap().reset_job(job_id).unwrap();
    let status = run_crawl(storage.clone(), config, job_id, &server.uri())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Completed);

    let second = storage.lock().unwrap().count_entities(job_id).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.pages, 2);
    assert_eq!(second.links, 2);
    assert_eq!(second.images, 1);
}

#[tokio::test]
async fn test_crawl_on_disk_database() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Disk</title>").await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sitescan.db");

    let job_id = {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let job_id = storage.create_job(&server.uri()).unwrap();
        let storage = Arc::new(Mutex::new(storage));
        let status = run_crawl(storage, create_test_config(), job_id, &server.uri())
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Completed);
        job_id
    };

    // Reopen and read back
    let storage = SqliteStorage::new(&db_path).unwrap();
    let job = storage.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.totals.pages, 1);
}

#[tokio::test]
async fn test_unreachable_seed_fails_item_but_completes_job() {
    // Nothing listens on port 1
    let seed = "http://127.0.0.1:1";

    let mut storage = SqliteStorage::open_in_memory().unwrap();
    let job_id = storage.create_job(seed).unwrap();
    let storage = Arc::new(Mutex::new(storage));

    let status = run_crawl(storage.clone(), create_test_config(), job_id, seed)
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = storage.lock().unwrap();
    let queue = storage.list_queue(job_id).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].status, QueueStatus::Failed);
    assert_eq!(queue[0].retry_count, 1);
    assert_eq!(storage.count_entities(job_id).unwrap().pages, 0);
}
