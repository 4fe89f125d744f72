use serde::Deserialize;

/// Default number of parallel requests per batch
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default maximum crawl depth
pub const DEFAULT_MAX_CRAWL_DEPTH: u32 = 50;

/// Default number of redirects before a page is flagged in reports
pub const DEFAULT_MAX_REDIRECT_THRESHOLD: u32 = 3;

/// Main configuration structure for Sitescan
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of queue items claimed and fetched in parallel per batch
    pub concurrency: usize,

    /// Pages at this depth are fetched but their links are not enqueued
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Redirect count above which reports flag a page as excessive
    #[serde(rename = "max-redirect-threshold")]
    pub max_redirect_threshold: u32,

    /// Enqueue internal links marked rel="nofollow"
    #[serde(rename = "follow-nofollow")]
    pub follow_nofollow: bool,

    /// Issue HEAD/partial GET requests for newly seen images and scripts
    #[serde(rename = "probe-assets")]
    pub probe_assets: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_depth: DEFAULT_MAX_CRAWL_DEPTH,
            max_redirect_threshold: DEFAULT_MAX_REDIRECT_THRESHOLD,
            follow_nofollow: true,
            probe_assets: true,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Redirect hops followed before the fetch fails
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "WebCrawler/1.0".to_string(),
            request_timeout_secs: 30,
            max_redirects: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./sitescan.db".to_string(),
        }
    }
}
