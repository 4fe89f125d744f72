//! HTML content extraction
//!
//! This module turns a fetched HTML document into the records the crawler
//! stores: title, meta description, favicon, anchors, images and scripts.
//! Parsing is tolerant; malformed markup never fails extraction.

use crate::url::{asset_kind, is_internal};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Favicon `<link>` selectors, in order of preference
const FAVICON_SELECTORS: [&str; 3] = [
    r#"link[rel="icon"]"#,
    r#"link[rel="shortcut icon"]"#,
    r#"link[rel="apple-touch-icon"]"#,
];

/// Everything extracted from one HTML page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Trimmed text of the first `<title>`, or empty
    pub title: String,

    /// `content` of `<meta name="description">`, or empty
    pub meta_description: String,

    /// Absolute favicon URL; `/favicon.ico` when the page declares none
    pub favicon_url: Option<String>,

    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
    pub scripts: Vec<ExtractedScript>,
}

/// An `<a>` element with a resolvable href
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: Url,
    pub text: String,
    pub is_nofollow: bool,
    pub is_internal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub url: Url,
    pub alt_text: Option<String>,
    pub is_responsive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedScript {
    pub url: Url,
    pub script_type: Option<String>,
    pub is_async: bool,
    pub is_defer: bool,
}

/// Extracts metadata, links and assets from an HTML document
///
/// # Arguments
///
/// * `html` - The HTML content
/// * `page_url` - URL the document was served from, used to resolve relative references
/// * `base_domain` - The crawl's host; links to exactly this host are internal
///
/// # Link rules
///
/// - Every `<a>` is considered; a missing, empty or `#` href is skipped
/// - An href that cannot be resolved is skipped on its own
/// - A resolved URL whose path ends in an image or script extension is not a link
///
/// # Example
///
/// ```
/// use sitescan::crawler::extract;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let page = extract(html, &page_url, "example.com");
/// assert_eq!(page.title, "Test");
/// assert!(page.links[0].is_internal);
/// ```
pub fn extract(html: &str, page_url: &Url, base_domain: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        meta_description: extract_meta_description(&document),
        favicon_url: extract_favicon(&document, page_url),
        links: extract_links(&document, page_url, base_domain),
        images: extract_images(&document, page_url),
        scripts: extract_scripts(&document, page_url),
    }
}

fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_meta_description(document: &Html) -> String {
    let Ok(selector) = Selector::parse(r#"meta[name="description"]"#) else {
        return String::new();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

fn extract_favicon(document: &Html, page_url: &Url) -> Option<String> {
    for pattern in FAVICON_SELECTORS {
        let Ok(selector) = Selector::parse(pattern) else {
            continue;
        };

        let href = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty());

        if let Some(href) = href {
            if let Ok(url) = page_url.join(href) {
                return Some(url.to_string());
            }
        }
    }

    page_url.join("/favicon.ico").ok().map(|url| url.to_string())
}

fn extract_links(document: &Html, page_url: &Url, base_domain: &str) -> Vec<ExtractedLink> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?.trim();
            if href.is_empty() || href == "#" {
                return None;
            }

            let url = page_url.join(href).ok()?;
            if asset_kind(&url).is_some() {
                return None;
            }

            Some(ExtractedLink {
                is_internal: is_internal(&url, base_domain),
                is_nofollow: rel_contains(&element, "nofollow"),
                text: collapse_whitespace(&element.text().collect::<String>()),
                url,
            })
        })
        .collect()
}

fn extract_images(document: &Html, page_url: &Url) -> Vec<ExtractedImage> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let element = element.value();
            let url = resolve_asset(element.attr("src")?, page_url)?;

            let non_empty = |name| {
                element
                    .attr(name)
                    .map_or(false, |value: &str| !value.trim().is_empty())
            };

            Some(ExtractedImage {
                url,
                alt_text: element.attr("alt").map(|alt| alt.trim().to_string()),
                is_responsive: non_empty("srcset") || non_empty("sizes"),
            })
        })
        .collect()
}

fn extract_scripts(document: &Html, page_url: &Url) -> Vec<ExtractedScript> {
    let Ok(selector) = Selector::parse("script[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let element = element.value();
            let url = resolve_asset(element.attr("src")?, page_url)?;

            Some(ExtractedScript {
                url,
                script_type: element
                    .attr("type")
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string),
                is_async: element.attr("async").is_some(),
                is_defer: element.attr("defer").is_some(),
            })
        })
        .collect()
}

/// Resolves an asset reference, dropping the fragment so one file maps to one URL
fn resolve_asset(src: &str, page_url: &Url) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    let mut url = page_url.join(src).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Case-insensitive substring match, so `nofollow,noopener` counts too
fn rel_contains(element: &ElementRef<'_>, value: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map_or(false, |rel| rel.to_ascii_lowercase().contains(value))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
