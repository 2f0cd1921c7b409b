//! Application-group pricing and SLA reporting pipeline library

// Public modules
pub mod config;
pub mod db;
pub mod engines;
pub mod error;
pub mod logging;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Settings;
pub use error::PipelineError;
pub use services::{PipelineController, RunSummary, TargetYear};
