//! Public and internal types for the valicat API and pipeline.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::utils::config::{DEFAULT_PREVIEW_EDGE, PoolConsts, StoreConsts};

/// Catalog image identifier (`Adobe_images.id_local`). Owned by the catalog, only referenced here.
pub type ImageId = i64;

/// MD5 content digest. Stored in the side tables as 32 uppercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// True when `stored` (as read from the side tables) names the same digest. Case-insensitive.
    pub fn matches_stored(&self, stored: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(stored.trim())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            anyhow::bail!("digest must be 32 hex characters, got {:?}", s);
        }
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)?;
        }
        Ok(Digest(out))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Discovery candidate: a catalog image with no record and no error.
#[derive(Clone, Debug)]
pub struct NewCandidate {
    pub image_id: ImageId,
    pub path: PathBuf,
}

/// Revalidation candidate: a clean record last checked before the cutoff.
#[derive(Clone, Debug)]
pub struct DueCandidate {
    pub image_id: ImageId,
    /// Where the catalog says the file is now. `None` when the image left the catalog.
    pub current_path: Option<PathBuf>,
    pub prior_digest: String,
    pub prior_path: Option<String>,
    pub first_checked_at: Option<String>,
    pub last_checked_at: Option<String>,
}

/// One unit of work for the pool.
#[derive(Clone, Debug)]
pub enum Candidate {
    New(NewCandidate),
    Due(DueCandidate),
}

impl Candidate {
    pub fn image_id(&self) -> ImageId {
        match self {
            Candidate::New(c) => c.image_id,
            Candidate::Due(c) => c.image_id,
        }
    }

    /// Path to check. Empty when a revalidation candidate no longer has a catalog path.
    pub fn path(&self) -> PathBuf {
        match self {
            Candidate::New(c) => c.path.clone(),
            Candidate::Due(c) => c.current_path.clone().unwrap_or_default(),
        }
    }
}

/// Which candidate set a run works through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Discovery,
    Revalidation { cutoff: NaiveDateTime },
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Discovery => "discovery",
            RunMode::Revalidation { .. } => "revalidation",
        }
    }
}

/// Exact counts of the four disjoint categories, from the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new_images: u64,
    pub due_images: u64,
    pub new_errors: u64,
    pub revalidation_errors: u64,
}

/// What the status layer shows. Counts are approximate while runs are active; `None` = not known yet.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatusSnapshot {
    pub new_images: Option<u64>,
    pub due_images: Option<u64>,
    pub new_errors: Option<u64>,
    pub revalidation_errors: Option<u64>,
    pub in_flight: usize,
    pub discovery_active: bool,
    pub revalidation_active: bool,
}

/// Which failures to list for review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewKind {
    /// Errors for images that never validated (no record).
    NewErrors,
    /// Errors raised while revalidating an existing record.
    RevalidationErrors,
}

/// One failure as shown to a reviewer.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorReviewRow {
    pub image_id: ImageId,
    pub detected_at: String,
    /// Set only for checksum mismatches; the digest `accept` would adopt.
    pub new_digest: Option<String>,
    pub message: String,
    pub suggestion: String,
    /// Current location according to the catalog.
    pub catalog_path: Option<String>,
    /// Location at the last successful check.
    pub prior_path: Option<String>,
    pub orientation: Option<String>,
    pub last_checked_at: Option<String>,
    pub first_checked_at: Option<String>,
}

impl ErrorReviewRow {
    /// Path to store on accept: the catalog's current path, else the last known one.
    pub fn last_known_path(&self) -> Option<&str> {
        self.catalog_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.prior_path.as_deref())
    }
}

/// Result of one driver run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub mode: &'static str,
    pub dispatched: usize,
    pub recorded: usize,
    pub confirmed: usize,
    pub missing: usize,
    pub unreadable: usize,
    pub mismatched: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.missing + self.unreadable + self.mismatched
    }
}

/// Options for a [`Validator`](crate::Validator) (CLI, `valicat.toml`, or lib callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Catalog database. Side tables live inside it.
    pub catalog: PathBuf,
    /// Handlers per pool.
    pub max_concurrent: usize,
    /// Writes per committed transaction.
    pub batch_size: usize,
    /// Edge length asked of the preview extractor.
    pub preview_edge: u32,
    /// Debug logging and progress bar.
    pub verbose: bool,
    /// Machine-readable output (CLI).
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            catalog: PathBuf::new(),
            max_concurrent: PoolConsts::MAX_CONCURRENT,
            batch_size: StoreConsts::BATCH_SIZE,
            preview_edge: DEFAULT_PREVIEW_EDGE,
            verbose: false,
            json: false,
        }
    }
}
