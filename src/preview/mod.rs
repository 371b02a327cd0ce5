//! Embedded preview extraction from the catalog's preview cache files.

mod cache;
mod container;

pub use cache::{CacheEntry, PreviewCache};
pub use container::{PreviewLevel, scan_levels, select_level};

use image::{DynamicImage, ImageFormat};
use std::path::Path;

/// Stored orientation of a cached preview, as the rotation that makes it upright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Upright,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// `AB`, `BC`, `CD`, `DA`; anything else is upright.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "BC" => Orientation::Rotate90,
            "CD" => Orientation::Rotate180,
            "DA" => Orientation::Rotate270,
            _ => Orientation::Upright,
        }
    }

    /// Rotate clockwise by this orientation.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Upright => img,
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

/// Decode the preview in `cache_file` nearest `target_edge` pixels and rotate it by `orientation`.
/// Unreadable files, files with no levels and undecodable JPEG data all give `None`.
pub fn extract(cache_file: &Path, target_edge: u32, orientation: &str) -> Option<DynamicImage> {
    let data = match std::fs::read(cache_file) {
        Ok(d) => d,
        Err(e) => {
            log::debug!("Preview {} unreadable: {}", cache_file.display(), e);
            return None;
        }
    };
    extract_from_bytes(&data, target_edge, orientation)
}

/// Same as [`extract`] over bytes already in memory.
pub fn extract_from_bytes(data: &[u8], target_edge: u32, orientation: &str) -> Option<DynamicImage> {
    let level = select_level(scan_levels(data), target_edge)?;
    let jpeg = level.bytes(data)?;
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| log::debug!("Preview level {}x{} did not decode: {}", level.width, level.height, e))
        .ok()?;
    Some(Orientation::from_code(orientation).apply(img))
}
