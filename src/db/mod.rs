//! Database module
//!
//! Contains the reporting database client, typed models, store traits and
//! the Postgres-backed repositories.

pub mod models;
pub mod reporting_db;
pub mod repositories;
pub mod store;

pub use models::{
    ApplicationGroup, ApplicationMapping, DriverReference, MatrixPriceEntry, PricingModel, Purpose,
    PxqRecord, ReportingPeriod, ReportingRecord, UsageRow,
};
pub use reporting_db::ReportingDb;
pub use repositories::{
    DryRunReportingStore, MappingRepository, PgConfigStore, PricingModelRepository,
    ReportingRepository,
};
pub use store::{ConfigStore, ReportingStore, StoreError};
