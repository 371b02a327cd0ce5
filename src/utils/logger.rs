//! Logging for the CLI. The library itself only emits through `log`; the binary installs
//! this formatter once at startup.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter, Record};
use std::io::Write;

const TAG: &str = env!("CARGO_PKG_NAME");

/// Install the `env_logger` backend: dependencies at `Warn`, this crate at `Info`
/// (`Debug` when `verbose`). `RUST_LOG` still applies on top. A second call is a no-op.
pub fn setup_logging(verbose: bool) {
    let own = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(TAG, own)
        .format(|buf, record| writeln!(buf, "{}", render(record)))
        .try_init();
}

/// Warnings and errors carry the module they came from; progress lines do not.
fn render(record: &Record<'_>) -> String {
    let tag = TAG.cyan();
    let level = match record.level() {
        Level::Error => "ERROR".red(),
        Level::Warn => "WARN".yellow(),
        _ => return format!("[{tag}] {}", record.args()),
    };
    format!("[{tag} {level} {}] {}", record.target().white(), record.args())
}
