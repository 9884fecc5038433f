//! Tuning configuration for the globe terrain engine, persisted as RON.

mod config;
mod error;

pub use config::TerrainConfig;
pub use error::ConfigError;
