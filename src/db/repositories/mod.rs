//! Repository pattern implementations
//!
//! Data access objects for the reporting database tables.

pub mod mapping;
pub mod pricing_model;
pub mod reporting;

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::models::{
    ApplicationGroup, ApplicationMapping, DriverReference, MatrixPriceEntry, PxqRecord,
};
use crate::db::{ConfigStore, ReportingDb, StoreError};

pub use mapping::MappingRepository;
pub use pricing_model::PricingModelRepository;
pub use reporting::{DryRunReportingStore, ReportingRepository};

/// Configuration store backed by the reporting database
#[derive(Clone)]
pub struct PgConfigStore {
    pricing: PricingModelRepository,
    mappings: MappingRepository,
}

impl PgConfigStore {
    pub fn new(client: Arc<ReportingDb>) -> Self {
        Self {
            pricing: PricingModelRepository::new(client.clone()),
            mappings: MappingRepository::new(client),
        }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn application_groups(&self) -> Result<Vec<ApplicationGroup>, StoreError> {
        self.pricing.list_groups().await
    }

    async fn pxq_record(&self, application_group: &str) -> Result<Option<PxqRecord>, StoreError> {
        self.pricing.pxq_record(application_group).await
    }

    async fn matrix_entry(
        &self,
        application_group: &str,
    ) -> Result<Option<MatrixPriceEntry>, StoreError> {
        self.pricing.matrix_entry(application_group).await
    }

    async fn application_mappings(
        &self,
        application_group: &str,
    ) -> Result<Vec<ApplicationMapping>, StoreError> {
        self.mappings.mappings_for(application_group).await
    }

    async fn driver_reference(&self, reference: i64) -> Result<Option<DriverReference>, StoreError> {
        self.mappings.driver_reference(reference).await
    }
}
