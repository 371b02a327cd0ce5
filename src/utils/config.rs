//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    catalog_env_key: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                catalog_env_key: format!("{}_CATALOG", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// `valicat.toml`, looked up next to the catalog.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable naming the default catalog (`VALICAT_CATALOG`).
    pub fn catalog_env_key(&self) -> &str {
        &self.catalog_env_key
    }

    /// Preview cache directory that sits beside a catalog: `<stem> Previews.lrdata`.
    pub fn previews_dir_for(&self, catalog: &Path) -> PathBuf {
        let stem = catalog
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        catalog
            .parent()
            .unwrap_or(Path::new("."))
            .join(format!("{stem} Previews.lrdata"))
    }
}

// ---- Worker pool ----

/// Worker pool sizing. Discovery and revalidation each get their own pool of this size.
pub struct PoolConsts;

impl PoolConsts {
    /// Maximum handlers running at once per pool.
    pub const MAX_CONCURRENT: usize = 6;
}

// ---- Database ----

/// Store batching and query tuning.
pub struct StoreConsts;

impl StoreConsts {
    /// Outcome writes per committed transaction.
    pub const BATCH_SIZE: usize = 50;
    /// Candidates fetched per page by the driver (keyset paging on image id).
    pub const CANDIDATE_PAGE_SIZE: usize = 500;
    /// How long to wait on a catalog locked by another process before failing.
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(3);
    /// Number of cutoff buckets offered by [`cutoff_buckets`](crate::engine::cutoff_buckets).
    pub const CUTOFF_BUCKETS: usize = 10;
}

/// Timestamp layout used in the side tables (local time, lexically sortable).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---- Hashing ----

/// Hashing I/O buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Chunk size for streaming a file through the digest (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}

// ---- Status ----

/// Status refresh throttling.
pub struct StatusConsts;

impl StatusConsts {
    /// While a run is active, re-query counts at most this often; approximate counters fill the gap.
    pub const REFRESH_WHEN_BUSY: Duration = Duration::from_secs(300);
}

// ---- Preview ----

/// Default edge (pixels) asked for when extracting a preview.
pub const DEFAULT_PREVIEW_EDGE: u32 = 1024;
