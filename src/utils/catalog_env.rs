//! Default catalog lookup: env var → `.env` in the working directory.

use log::debug;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

fn non_empty_env(key: &str) -> Option<String> {
    let s = std::env::var(key).ok()?;
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

/// Catalog path from `VALICAT_CATALOG`, loading `dir/.env` first if the variable is not already set.
pub fn catalog_from_env(dir: &Path) -> Option<PathBuf> {
    let key = PackagePaths::get().catalog_env_key();
    if let Some(s) = non_empty_env(key) {
        return Some(PathBuf::from(s));
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        debug!("Loading {}", env_path.display());
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(key).map(PathBuf::from);
    }
    None
}
