use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (`mailto:`, `data:` and the like), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitescan::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://sub.example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `url` is on exactly the crawl's base domain
///
/// Subdomains are external: `blog.example.com` is not internal to `example.com`.
pub fn is_internal(url: &Url, base_domain: &str) -> bool {
    extract_domain(url).is_some_and(|domain| domain == base_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_without_host() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(extract_domain(&url), None);
    }

    #[test]
    fn test_is_internal_exact_match() {
        let url = Url::parse("https://Example.com/about").unwrap();
        assert!(is_internal(&url, "example.com"));
    }

    #[test]
    fn test_subdomain_is_external() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert!(!is_internal(&url, "example.com"));

        let url = Url::parse("https://www.example.com/").unwrap();
        assert!(!is_internal(&url, "example.com"));
    }

    #[test]
    fn test_other_domain_is_external() {
        let url = Url::parse("http://external.com").unwrap();
        assert!(!is_internal(&url, "example.com"));
    }
}
