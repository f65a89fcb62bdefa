//! Pipeline entry points for aggregation runs.
//!
//! - `run_pipeline`: Discover, acquire, merge and publish in one run
//! - `WorkerPool`: Bounded per-link processing with cache consultation
//! - `merge` / `publish`: UID deduplication and atomic artifact replacement

pub mod merge;
pub mod pool;
pub mod run;

pub use merge::{MergedCalendar, merge, publish};
pub use pool::WorkerPool;
pub use run::run_pipeline;
