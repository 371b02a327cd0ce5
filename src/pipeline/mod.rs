//! Pipeline components: worker pool, cancellation, run driver, validation context.

pub mod cancel;
pub mod context;
pub mod driver;
pub mod error_handler;
pub mod pool;

pub use cancel::CancelToken;
pub use context::{ApproxCounts, Validator};
pub use driver::{ProgressFn, RunClaim, ValidationDriver};
pub use error_handler::FirstError;
pub use pool::{Handler, WorkerPool};
