use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::ReviewKind;

/// Incremental checksum validation for a photo catalog.
#[derive(Clone, Parser)]
#[command(name = "valicat")]
#[command(about = "Validate catalog images against stored checksums and review failures.")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Catalog file. Default: `VALICAT_CATALOG` from the environment or `.env`.
    #[arg(long, short, global = true)]
    pub catalog: Option<PathBuf>,

    /// Verbose output (debug logging and progress bar).
    #[arg(long, short = 'v', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Concurrent checksum workers per run.
    #[arg(long, short = 'j', global = true)]
    pub max_concurrent: Option<usize>,

    /// Outcome writes per committed transaction.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Show counts of new, due and failed images.
    Status {
        /// Count images last checked before this time as due (default: now).
        #[arg(long)]
        cutoff: Option<String>,
    },
    /// Checksum every image that has never been validated.
    Discover,
    /// Re-check images last validated before the cutoff.
    Revalidate {
        /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM[:SS]`, local time.
        #[arg(long)]
        cutoff: String,
    },
    /// Suggest revalidation cutoffs that cover roughly equal shares of clean images.
    Buckets,
    /// List validation errors awaiting review.
    Errors {
        /// Restrict to one kind of error.
        #[arg(long, value_enum)]
        kind: Option<ErrorKindArg>,
    },
    /// Forget the errors of these images so they are checked again.
    Ignore {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
    /// Adopt the new checksum of these images (checksum mismatches only).
    Accept {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
    /// Write the cached preview of an image to a file.
    Preview {
        id: i64,
        /// Output JPEG path.
        #[arg(long, short)]
        out: PathBuf,
        /// Preferred edge length in pixels.
        #[arg(long)]
        edge: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ErrorKindArg {
    /// Images that never validated.
    New,
    /// Images that failed a revalidation.
    Revalidate,
}

impl From<ErrorKindArg> for ReviewKind {
    fn from(k: ErrorKindArg) -> Self {
        match k {
            ErrorKindArg::New => ReviewKind::NewErrors,
            ErrorKindArg::Revalidate => ReviewKind::RevalidationErrors,
        }
    }
}
