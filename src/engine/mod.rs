//! Engine module for checksum, classification and catalog operations

pub mod arg_parser;
pub mod classify;
pub mod cli;
pub mod db_ops;
pub mod hashing;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use classify::{Failure, FailureKind, FileProbe, Outcome, classify, evaluate, probe_file};
pub use cli::handle_run;
pub use db_ops::{
    BatchStore, CutoffBucket, cutoff_buckets, discovery_page, due_page, list_errors, open_catalog,
    open_catalog_in_memory, status_counts, validation_tables_present,
};
pub use hashing::{file_exists, hash_file};
pub use tools::{format_stamp, now_stamp, parse_cutoff};
