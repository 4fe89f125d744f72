use url::Url;

/// File extensions that identify an image resource
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "tiff", "tif", "avif",
];

/// File extensions that identify a script resource
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "jsx"];

/// Kind of static asset a URL points at, judged by its path extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Script,
}

/// Classifies a URL by the extension of its last path segment
///
/// Query string and fragment are ignored, and the comparison is case-insensitive.
pub fn asset_kind(url: &Url) -> Option<AssetKind> {
    let last_segment = url.path().rsplit('/').next()?;
    let (_, extension) = last_segment.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(AssetKind::Image)
    } else if SCRIPT_EXTENSIONS.contains(&extension.as_str()) {
        Some(AssetKind::Script)
    } else {
        None
    }
}
