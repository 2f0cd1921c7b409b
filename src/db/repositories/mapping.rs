//! Application mapping repository
//!
//! Data access for the application-to-query mapping table and the driver
//! registry it points into.

use std::sync::Arc;

use crate::db::models::{ApplicationMapping, DriverReference};
use crate::db::{ReportingDb, StoreError};

/// Repository for application mappings and driver references
#[derive(Clone)]
pub struct MappingRepository {
    client: Arc<ReportingDb>,
}

impl MappingRepository {
    /// Create a new mapping repository
    pub fn new(client: Arc<ReportingDb>) -> Self {
        Self { client }
    }

    /// Get the stored queries of an application group
    pub async fn mappings_for(
        &self,
        application_group: &str,
    ) -> Result<Vec<ApplicationMapping>, StoreError> {
        let sql = format!(
            "SELECT application_group_name, app_name, db_name, environment, \
                    db_driver_reference_number::int8 AS db_driver_reference_number, sql_query \
             FROM {} WHERE application_group_name = $1",
            self.client.tables().application_mapping
        );

        let mappings = sqlx::query_as::<_, ApplicationMapping>(&sql)
            .bind(application_group)
            .fetch_all(self.client.pool())
            .await?;

        tracing::debug!(
            application_group = %application_group,
            count = mappings.len(),
            "Loaded application mappings"
        );

        Ok(mappings)
    }

    /// Look up a driver reference in the registry
    ///
    /// Returns None if the reference is not registered.
    pub async fn driver_reference(&self, reference: i64) -> Result<Option<DriverReference>, StoreError> {
        let sql = format!(
            "SELECT db_driver_reference_number::int8 AS db_driver_reference_number, \
                    db_engine, db_driver_path, db_driver_class, db_username, db_password \
             FROM {} WHERE db_driver_reference_number = $1",
            self.client.tables().driver_registry
        );

        let driver = sqlx::query_as::<_, DriverReference>(&sql)
            .bind(reference)
            .fetch_optional(self.client.pool())
            .await?;

        Ok(driver)
    }
}
