use screen_sieve_common::frame::parse_frame_timestamp;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::DedupError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Whether `path` has one of the image extensions a cycle considers.
/// In-flight `.part` files from the writer never match.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Snapshot the images directly inside `dir`, ordered by the capture
/// timestamp in their file names. Files without a timestamp come last,
/// ordered by name.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, DedupError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| DedupError::Scan(dir.display().to_string(), e))?;

    let mut images: Vec<(Option<f64>, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        // A file can vanish between listing and stat; treat that as "not there".
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !is_image_path(&path) {
            continue;
        }
        let ts = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_frame_timestamp(n).ok());
        images.push((ts, path));
    }

    images.sort_by(|(ta, pa), (tb, pb)| match (ta, tb) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal).then_with(|| pa.cmp(pb)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => pa.cmp(pb),
    });

    Ok(images.into_iter().map(|(_, p)| p).collect())
}
