pub mod format;
pub mod latency;
pub mod metrics;
pub mod types;

pub use format::{short_id, summarize_error_body};
pub use latency::*;
pub use metrics::try_init_prometheus;
pub use types::*;
