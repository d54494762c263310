//! Logging and metrics for the selection core.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{LogConfig, LogFormat, MetricsConfig};
pub use logging::init_logging;
