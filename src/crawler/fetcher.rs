//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client from configuration
//! - GET requests for pages, with the redirect chain recorded hop by hop
//! - HEAD and partial GET requests for asset metadata
//! - Error classification

use crate::config::HttpConfig;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{redirect::Policy, Client, Method, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Connect timeout applied to every request
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors that end a fetch without a usable response
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Invalid redirect location from {url}: {location}")]
    InvalidRedirect { url: String, location: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            FetchError::Timeout { url }
        } else if error.is_connect() {
            FetchError::Connect {
                url,
                message: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            FetchError::Body {
                url,
                message: error.to_string(),
            }
        } else {
            FetchError::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// One intermediate response of a redirect chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// The URL that answered with a redirect
    pub url: String,
    /// The redirect status it answered with
    pub status: u16,
}

/// A fetched page, after following redirects
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL of the final response
    pub final_url: Url,
    /// Status of the final response
    pub final_status: u16,
    /// Content-Type of the final response
    pub content_type: String,
    /// Body of the final response; empty unless it is HTML
    pub body: String,
    /// Redirects followed before the final response, in order
    pub redirect_chain: Vec<RedirectHop>,
}

impl FetchedPage {
    /// Status of the first response received for the requested URL
    pub fn status_code(&self) -> u16 {
        self.redirect_chain
            .first()
            .map(|hop| hop.status)
            .unwrap_or(self.final_status)
    }

    pub fn redirect_count(&self) -> u32 {
        self.redirect_chain.len() as u32
    }

    pub fn is_html(&self) -> bool {
        is_html(&self.content_type)
    }
}

/// Response headers of an asset request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceInfo {
    pub status_code: u16,
    pub content_type: Option<String>,
    /// Full resource size in bytes, when the server reports it
    pub content_length: Option<u64>,
    pub redirect_count: u32,
}

/// A partial GET: headers plus at most the requested number of bytes
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub info: ResourceInfo,
    pub bytes: Vec<u8>,
}

/// Returns true if a Content-Type denotes an HTML document
pub fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client so the fetcher can follow them
/// itself and record every hop. Certificate validation is off: targets are
/// arbitrary sites, self-signed ones included.
///
/// # Example
///
/// ```no_run
/// use sitescan::config::HttpConfig;
/// use sitescan::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP fetcher shared by all tasks of a crawl
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_redirects: usize,
}

impl Fetcher {
    /// Creates a fetcher from the HTTP configuration
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_redirects: config.max_redirects,
        })
    }

    /// Fetches a page with GET
    ///
    /// # Redirects
    ///
    /// 301, 302, 303, 307 and 308 responses carrying a `Location` header are
    /// followed up to the configured limit. Each one becomes a [`RedirectHop`].
    /// A chain longer than the limit (a loop included) is a
    /// [`FetchError::TooManyRedirects`].
    ///
    /// # Status codes
    ///
    /// Any final status, 4xx and 5xx included, is a successful fetch. Only
    /// transport failures produce an error.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let (response, redirect_chain) = self.send_following(Method::GET, url, None).await?;

        let final_url = response.url().clone();
        let final_status = response.status().as_u16();
        let content_type = header_string(response.headers(), CONTENT_TYPE).unwrap_or_default();

        let body = if is_html(&content_type) {
            response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(&final_url, e))?
        } else {
            String::new()
        };

        Ok(FetchedPage {
            final_url,
            final_status,
            content_type,
            body,
            redirect_chain,
        })
    }

    /// Sends a HEAD request and reports the final response's headers
    pub async fn fetch_head(&self, url: &Url) -> Result<ResourceInfo, FetchError> {
        let (response, chain) = self.send_following(Method::HEAD, url, None).await?;
        Ok(resource_info(&response, chain.len()))
    }

    /// Sends a GET with `Range: bytes=0-(limit-1)` and reads at most `limit` bytes
    ///
    /// Servers that ignore the range answer 200 with the full body; reading
    /// stops at `limit` either way.
    pub async fn fetch_range(&self, url: &Url, limit: usize) -> Result<RangeResponse, FetchError> {
        let range = format!("bytes=0-{}", limit.saturating_sub(1));
        let (mut response, chain) = self
            .send_following(Method::GET, url, Some(&range))
            .await?;

        let info = resource_info(&response, chain.len());
        let final_url = response.url().clone();

        let mut bytes = Vec::new();
        while bytes.len() < limit {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| FetchError::from_reqwest(&final_url, e))?;
            match chunk {
                Some(chunk) => {
                    let take = (limit - bytes.len()).min(chunk.len());
                    bytes.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }

        Ok(RangeResponse { info, bytes })
    }

    /// Sends a request, following redirects manually
    async fn send_following(
        &self,
        method: Method,
        url: &Url,
        range: Option<&str>,
    ) -> Result<(Response, Vec<RedirectHop>), FetchError> {
        let mut current = url.clone();
        let mut chain = Vec::new();

        loop {
            let mut request = self.client.request(method.clone(), current.clone());
            if let Some(range) = range {
                request = request.header(RANGE, range);
            }

            let response = request
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&current, e))?;

            let status = response.status();
            let location = if is_followed_redirect(status) {
                header_string(response.headers(), LOCATION)
            } else {
                None
            };

            let Some(location) = location else {
                return Ok((response, chain));
            };

            if chain.len() >= self.max_redirects {
                return Err(FetchError::TooManyRedirects {
                    url: url.to_string(),
                    limit: self.max_redirects,
                });
            }

            let next = current
                .join(&location)
                .map_err(|_| FetchError::InvalidRedirect {
                    url: current.to_string(),
                    location: location.clone(),
                })?;

            tracing::debug!(from = %current, to = %next, status = status.as_u16(), "Following redirect");

            chain.push(RedirectHop {
                url: current.to_string(),
                status: status.as_u16(),
            });
            current = next;
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resource_info(response: &Response, redirect_count: usize) -> ResourceInfo {
    let headers = response.headers();
    ResourceInfo {
        status_code: response.status().as_u16(),
        content_type: header_string(headers, CONTENT_TYPE),
        content_length: total_size(response.status(), headers),
        redirect_count: redirect_count as u32,
    }
}

/// Reads the full resource size from `Content-Range` or `Content-Length`
///
/// The header is read directly: for HEAD responses the body length reqwest
/// reports is always zero. A partial response only ever yields the total
/// from `Content-Range`; its `Content-Length` is the slice length.
fn total_size(status: StatusCode, headers: &HeaderMap) -> Option<u64> {
    if let Some(range) = header_string(headers, CONTENT_RANGE) {
        // "bytes 0-32767/123456", or "bytes 0-0/*" when the total is unknown
        return range.rsplit('/').next().and_then(|t| t.parse().ok());
    }

    if status == StatusCode::PARTIAL_CONTENT {
        return None;
    }

    header_string(headers, CONTENT_LENGTH).and_then(|length| length.parse().ok())
}
