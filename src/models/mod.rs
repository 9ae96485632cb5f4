// src/models/mod.rs

//! Domain models for the monitor.

mod config;
mod observation;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, DetectionConfig, ExtractionMode, HttpConfig, LoggingConfig, MonitorConfig,
    StorageConfig,
};
pub use observation::{ObservationResult, ObservationStatus};
pub use snapshot::Snapshot;
