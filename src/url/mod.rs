//! URL handling module for Sitescan
//!
//! This module provides URL normalization, seed resolution, domain extraction
//! and asset-extension classification.

mod asset;
mod domain;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use asset::{asset_kind, AssetKind};
pub use domain::{extract_domain, is_internal};
pub use normalize::normalize_url;

/// Resolves a submitted domain into the seed URL of a crawl
///
/// Input without an `http://` or `https://` prefix is treated as a bare
/// domain and gets `https://`. Only HTTP(S) seeds with a host are accepted.
///
/// # Examples
///
/// ```
/// use sitescan::url::seed_url;
///
/// let url = seed_url("example.com").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/");
///
/// let url = seed_url("http://Example.com/start").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/start");
/// ```
pub fn seed_url(domain: &str) -> UrlResult<Url> {
    let trimmed = domain.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Returns the case-folded host a crawl is scoped to
pub fn base_domain(seed: &Url) -> UrlResult<String> {
    extract_domain(seed).ok_or(UrlError::MissingDomain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_domain_gets_https() {
        let url = seed_url("example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_explicit_scheme_kept() {
        let url = seed_url("http://example.com/").unwrap();
        assert_eq!(url.scheme(), "http");

        let url = seed_url("HTTPS://example.com/").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let url = seed_url("  example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_invalid_seed() {
        assert!(seed_url("").is_err());
        assert!(seed_url("https://").is_err());
        assert!(seed_url("exa mple.com").is_err());
    }

    #[test]
    fn test_base_domain_case_folded() {
        let url = seed_url("https://WWW.Example.COM/").unwrap();
        assert_eq!(base_domain(&url).unwrap(), "www.example.com");
    }
}
