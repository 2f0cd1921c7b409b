//! Pricing model repository
//!
//! Data access for the pricing model and price matrix tables.

use std::sync::Arc;

use crate::db::models::{
    ApplicationGroup, ApplicationGroupRow, MatrixPriceEntry, PxqRecord, PXQ_MODEL_TAG,
};
use crate::db::{ReportingDb, StoreError};

/// Repository for pricing model lookups
#[derive(Clone)]
pub struct PricingModelRepository {
    client: Arc<ReportingDb>,
}

impl PricingModelRepository {
    /// Create a new pricing model repository
    pub fn new(client: Arc<ReportingDb>) -> Self {
        Self { client }
    }

    /// List every application group with its pricing model and purpose
    pub async fn list_groups(&self) -> Result<Vec<ApplicationGroup>, StoreError> {
        let sql = format!(
            "SELECT application_group_name, pricing_model, purpose FROM {}",
            self.client.tables().pricing_model
        );

        let rows = sqlx::query_as::<_, ApplicationGroupRow>(&sql)
            .fetch_all(self.client.pool())
            .await?;

        tracing::debug!(count = rows.len(), "Loaded application groups");

        Ok(rows.into_iter().map(ApplicationGroup::from).collect())
    }

    /// Get the PXQ record of the group
    ///
    /// The first row wins when several PXQ rows exist for one group.
    pub async fn pxq_record(&self, application_group: &str) -> Result<Option<PxqRecord>, StoreError> {
        let sql = format!(
            "SELECT application_group_name, dupricing_model::float8 AS dupricing_model \
             FROM {} WHERE application_group_name = $1 AND upper(pricing_model) = $2 \
             LIMIT 1",
            self.client.tables().pricing_model
        );

        let record = sqlx::query_as::<_, PxqRecord>(&sql)
            .bind(application_group)
            .bind(PXQ_MODEL_TAG)
            .fetch_optional(self.client.pool())
            .await?;

        Ok(record)
    }

    /// Get the matrix entry of the group
    ///
    /// A group is expected to have exactly one entry. When several exist the
    /// first one is used and a warning is logged.
    pub async fn matrix_entry(
        &self,
        application_group: &str,
    ) -> Result<Option<MatrixPriceEntry>, StoreError> {
        let sql = format!(
            "SELECT application_group_name, \
                    price_year1::float8 AS price_year1, \
                    price_year2::float8 AS price_year2 \
             FROM {} WHERE application_group_name = $1",
            self.client.tables().pricing_matrix
        );

        let mut entries = sqlx::query_as::<_, MatrixPriceEntry>(&sql)
            .bind(application_group)
            .fetch_all(self.client.pool())
            .await?;

        if entries.len() > 1 {
            tracing::warn!(
                application_group = %application_group,
                count = entries.len(),
                "Multiple matrix entries found, using the first"
            );
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(entries.swap_remove(0)))
        }
    }
}
