//! File names for exported drawings and screenshots.

/// Extension of saved documents (volume plus annotations).
pub const DRAWING_SUFFIX: &str = ".drawing.nvd";
/// Extension of saved screenshots.
pub const SCREENSHOT_SUFFIX: &str = ".png";

const FALLBACK_STEM: &str = "drawing";

/// Base name of a volume URL: last path segment up to the first dot.
///
/// `https://host/data/visiblehuman.nii.gz` gives `visiblehuman`.
pub fn volume_stem(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    if stem.is_empty() { FALLBACK_STEM } else { stem }
}

/// File name for saving the drawing of the given volume.
pub fn drawing_filename(volume_url: Option<&str>) -> String {
    format!("{}{}", volume_url.map_or(FALLBACK_STEM, volume_stem), DRAWING_SUFFIX)
}

/// File name for a screenshot of the given volume.
pub fn screenshot_filename(volume_url: Option<&str>) -> String {
    format!("{}{}", volume_url.map_or(FALLBACK_STEM, volume_stem), SCREENSHOT_SUFFIX)
}
