pub mod logger;
pub mod progress;
pub mod stats;

pub use logger::{init_logger, is_logging_enabled, log_failure, log_stats, log_with_timestamp, RunLog};
pub use progress::ProgressReader;
pub use stats::Stats;
