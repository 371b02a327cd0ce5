//! valicat: incremental checksum validation for a photo catalog.
//!
//! Images the catalog knows about are checksummed once (discovery) and re-checked later
//! (revalidation); results land in two side tables inside the catalog. Failures wait there for a
//! reviewer to ignore or accept them.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod review;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{ChecksumFailure, Declined};
pub use pipeline::{CancelToken, Validator};
pub use review::ReviewOutcome;

/// Result alias used by public valicat API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Open the catalog named in `opts` and return a ready [`Validator`].
///
/// Fails when the catalog is missing, locked by another application, or lacks the side tables.
pub fn open(opts: &Opts) -> Result<Validator> {
    log::debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    Validator::open(opts)
}
