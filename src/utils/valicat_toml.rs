//! Load `valicat.toml` from the catalog's directory (CLI only). The library takes its settings
//! through [`Opts`](crate::Opts) and never reads this file itself.

use serde::Deserialize;
use std::path::Path;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Deserialize)]
pub(crate) struct ValicatToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    max_concurrent: Option<usize>,
    batch_size: Option<usize>,
    preview_edge: Option<u32>,
    verbose: Option<bool>,
}

/// Load `valicat.toml` from `dir` if present. Returns None if file missing or unreadable.
pub(crate) fn load_valicat_toml(dir: &Path) -> Option<ValicatToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub(crate) fn apply_file_to_opts(file: &ValicatToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, max_concurrent => max_concurrent);
    apply_file_opt!(sec, opts, batch_size => batch_size);
    apply_file_opt!(sec, opts, preview_edge => preview_edge);
    apply_file_opt!(sec, opts, verbose => verbose);
    // Both must be at least 1.
    opts.max_concurrent = opts.max_concurrent.max(1);
    opts.batch_size = opts.batch_size.max(1);
}
