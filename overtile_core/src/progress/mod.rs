//! Progress reporting for long-running pyramid operations.

mod progress_drain;
mod progress_fn;
mod progress_log;
mod traits;

pub use progress_drain::ProgressDrain;
pub use progress_fn::ProgressFn;
pub use progress_log::ProgressLog;
pub use traits::*;
