pub mod catalog_env;
pub mod config;
pub mod logger;
pub(crate) mod valicat_toml;

pub use catalog_env::catalog_from_env;
pub use config::*;
pub use logger::setup_logging;
