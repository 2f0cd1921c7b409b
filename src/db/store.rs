//! Store abstractions
//!
//! The pipeline reads configuration through [`ConfigStore`] and persists
//! figures through [`ReportingStore`]. The Postgres-backed implementations
//! live in [`crate::db::repositories`].

use async_trait::async_trait;

use crate::config::SinkTables;
use crate::db::models::{
    ApplicationGroup, ApplicationMapping, DriverReference, MatrixPriceEntry, PxqRecord,
    ReportingRecord,
};

/// Read-only access to the configuration tables
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Every application group in the pricing model table
    async fn application_groups(&self) -> Result<Vec<ApplicationGroup>, StoreError>;

    /// The group's pricing model record tagged PXQ, if any
    async fn pxq_record(&self, application_group: &str) -> Result<Option<PxqRecord>, StoreError>;

    /// The group's active matrix entry, if any
    async fn matrix_entry(
        &self,
        application_group: &str,
    ) -> Result<Option<MatrixPriceEntry>, StoreError>;

    /// Stored queries for the group, in table order
    async fn application_mappings(
        &self,
        application_group: &str,
    ) -> Result<Vec<ApplicationMapping>, StoreError>;

    /// Registry lookup for a driver reference number
    async fn driver_reference(&self, reference: i64) -> Result<Option<DriverReference>, StoreError>;
}

/// Write access to the daily/monthly reporting tables
#[async_trait]
pub trait ReportingStore: Send + Sync {
    /// Persist all records of one sink call as a single unit of work.
    ///
    /// Either every record is written or none is.
    async fn write_batch(
        &self,
        tables: &SinkTables,
        records: &[ReportingRecord],
    ) -> Result<(), StoreError>;
}

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
                StoreError::ParseError(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}
