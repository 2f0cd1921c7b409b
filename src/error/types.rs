//! Pipeline error types

use thiserror::Error;

use crate::db::StoreError;
use crate::engines::EngineError;

/// Errors raised while processing an application group.
///
/// Every variant is contained at the application-group boundary by the
/// pipeline controller; only a failure to list the groups themselves ends
/// the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration absent: {0}")]
    ConfigurationAbsent(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => PipelineError::Database(msg),
            StoreError::ParseError(msg) => PipelineError::DataIntegrity(msg),
        }
    }
}

impl PipelineError {
    /// Short machine-friendly category used in structured logs and run summaries
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::ConfigurationAbsent(_) => "configuration_absent",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Engine(_) => "engine",
            PipelineError::DataIntegrity(_) => "data_integrity",
            PipelineError::Database(_) => "database",
            PipelineError::Internal(_) => "internal",
        }
    }
}
