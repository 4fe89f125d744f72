//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect following
//! - HTML content extraction (metadata, links, images, scripts)
//! - Asset metadata probing
//! - Frontier management over the queue table
//! - Overall crawl coordination

mod assets;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;

pub use assets::{image_dimensions, AssetProber, DIMENSION_SNIFF_BYTES};
pub use coordinator::{run_crawl, Coordinator};
pub use extractor::{extract, ExtractedImage, ExtractedLink, ExtractedPage, ExtractedScript};
pub use fetcher::{
    build_http_client, is_html, FetchError, FetchedPage, Fetcher, RangeResponse, RedirectHop,
    ResourceInfo,
};
pub use frontier::{CrawlContext, Frontier};
