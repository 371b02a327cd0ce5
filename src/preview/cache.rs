//! Lookup of an image's preview file through the cache index beside the catalog.

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};

use crate::ImageId;
use crate::utils::config::PackagePaths;

const CACHE_ENTRY_SQL: &str =
    "SELECT uuid || '-' || digest, orientation FROM ImageCacheEntry WHERE imageId = ?1";

/// Where an image's preview lives and how it is oriented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub orientation: String,
}

/// The `<stem> Previews.lrdata` directory of one catalog.
pub struct PreviewCache {
    dir: PathBuf,
}

impl PreviewCache {
    pub fn for_catalog(catalog: &Path) -> Self {
        PreviewCache {
            dir: PackagePaths::get().previews_dir_for(catalog),
        }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        PreviewCache { dir: dir.into() }
    }

    /// File for an index name `F`: `<dir>/F[0..1]/F[0..4]/F.lrprev`.
    pub fn file_for(&self, name: &str) -> Option<PathBuf> {
        let first = name.get(0..1)?;
        let prefix = name.get(0..4)?;
        Some(
            self.dir
                .join(first)
                .join(prefix)
                .join(format!("{name}.lrprev")),
        )
    }

    /// `None` when the index is missing, unreadable or has no row for `image_id`.
    pub fn lookup(&self, image_id: ImageId) -> Option<CacheEntry> {
        let index = self.dir.join("previews.db");
        if !index.is_file() {
            log::debug!("No preview index at {}", index.display());
            return None;
        }
        let conn = Connection::open_with_flags(&index, OpenFlags::SQLITE_OPEN_READ_ONLY).ok()?;
        let row: Option<(String, Option<String>)> = conn
            .query_row(CACHE_ENTRY_SQL, params![image_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()
            .map_err(|e| log::debug!("Preview index query failed: {}", e))
            .ok()?;
        let (name, orientation) = row?;
        Some(CacheEntry {
            path: self.file_for(&name)?,
            orientation: orientation.unwrap_or_default(),
        })
    }
}
