//! Domain types and pure logic for the pond report pipeline.
//!
//! Everything in this crate is I/O-free: period-key codecs, the report
//! document types shared by all four aggregation levels, the water-quality
//! classification, and application configuration.

mod app_config;
mod config;
pub mod quality;
pub mod reports;
pub mod timekeys;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use quality::{classify, WaterQuality};
pub use reports::{Collection, DailyReport, HourRecord, MonthlyReport, WeeklyReport};
pub use timekeys::TimeKeyError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
