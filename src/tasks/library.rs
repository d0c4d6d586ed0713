use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{GalleryItemConfig, ImageSource};
use crate::error::GalleryError;

/// Recursively collects images under `root`, sorted by path, captioned with
/// their file stem.
pub fn scan(root: &Path) -> Result<Vec<GalleryItemConfig>, GalleryError> {
    let meta = std::fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(GalleryError::Config(format!(
            "library-path {} is not a directory",
            root.display()
        )));
    }

    let mut paths = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image(p))
        .collect::<Vec<_>>();
    paths.sort();

    let items = paths
        .into_iter()
        .map(|path| {
            debug!(path = %path.display(), "library image");
            let text = path
                .file_stem()
                .and_then(OsStr::to_str)
                .map(str::to_string);
            GalleryItemConfig {
                image: ImageSource::Path(path),
                text,
            }
        })
        .collect::<Vec<_>>();
    info!(root = %root.display(), discovered = items.len(), "library scan complete");
    Ok(items)
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}
