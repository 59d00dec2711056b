//! Configuration module for net-response.
//!
//! Provides YAML-based configuration loading for:
//! - Runner settings (concurrent or sequential probing)
//! - Endpoint definitions (`net_response` list)

mod app;
mod validation;

pub use app::{AppConfig, DESCRIPTION, RunnerConfig, SAMPLE_CONFIG};
pub use validation::ConfigError;
