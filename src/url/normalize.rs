use url::Url;

/// Normalizes a URL into the comparable key used for frontier deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; if that fails, return the input unchanged
/// 2. Remove the fragment (everything after #)
/// 3. Lowercase the host
/// 4. Reconcile the `www.` prefix with the crawl's base domain:
///    - base has `www.`, candidate doesn't → prefix it
///    - base lacks `www.`, candidate has it → strip it
/// 5. Remove trailing slashes from the path (the root `/` is kept)
///
/// Scheme, port and query string are kept as parsed.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
/// * `base_domain` - The lowercased host the crawl was seeded with
///
/// # Examples
///
/// ```
/// use sitescan::url::normalize_url;
///
/// let key = normalize_url("http://WWW.Example.com/a/#top", "example.com");
/// assert_eq!(key, "http://example.com/a");
/// ```
pub fn normalize_url(url_str: &str, base_domain: &str) -> String {
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        // Opaque key: may under-deduplicate, never fails
        Err(_) => return url_str.to_string(),
    };

    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let normalized_host = reconcile_www(&host.to_lowercase(), base_domain);
        if url.set_host(Some(&normalized_host)).is_err() {
            tracing::debug!("Keeping original host for {}: cannot use {}", url_str, normalized_host);
        }
    }

    if !url.cannot_be_a_base() {
        let normalized_path = trim_trailing_slashes(url.path());
        url.set_path(&normalized_path);
    }

    url.to_string()
}

/// Rewrites `host` so its `www.` prefix matches the base domain's
fn reconcile_www(host: &str, base_domain: &str) -> String {
    let base_has_www = base_domain.to_ascii_lowercase().starts_with("www.");
    let host_has_www = host.starts_with("www.");

    match (base_has_www, host_has_www) {
        (true, false) => format!("www.{}", host),
        (false, true) => host[4..].to_string(),
        _ => host.to_string(),
    }
}

/// Strips trailing slashes from a path; an emptied path becomes the root
fn trim_trailing_slashes(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
