//! Application mapping resolution
//!
//! Expands an application group into the stored queries that measure its
//! usage, each paired with the connection details of its driver reference.

use std::sync::Arc;

use crate::db::models::{ApplicationMapping, DriverReference};
use crate::db::ConfigStore;
use crate::error::PipelineError;

/// A mapping row whose driver reference resolved in the registry
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    pub mapping: ApplicationMapping,
    pub driver: DriverReference,
}

/// Resolves application mappings through the driver registry
#[derive(Clone)]
pub struct ApplicationMappingResolver {
    store: Arc<dyn ConfigStore>,
}

impl ApplicationMappingResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Resolve every mapping row of a group, in table order
    ///
    /// Rows whose driver reference is missing (or cannot be read) are
    /// logged and skipped; the remaining rows are still returned. Failing to
    /// read the mapping rows at all is an error for the whole group.
    pub async fn resolve(&self, application_group: &str) -> Result<Vec<ResolvedMapping>, PipelineError> {
        let mappings = self.store.application_mappings(application_group).await?;

        if mappings.is_empty() {
            tracing::warn!(
                application_group = %application_group,
                "No mappings found for application group"
            );
            return Ok(Vec::new());
        }

        let mut resolved = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            tracing::info!(
                application_group = %application_group,
                app_name = %mapping.app_name,
                environment = %mapping.environment,
                "Processing app"
            );

            match self.store.driver_reference(mapping.driver_reference).await {
                Ok(Some(driver)) => resolved.push(ResolvedMapping { mapping, driver }),
                Ok(None) => {
                    tracing::error!(
                        application_group = %application_group,
                        app_name = %mapping.app_name,
                        driver_reference = mapping.driver_reference,
                        "No DB driver found for reference"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        application_group = %application_group,
                        app_name = %mapping.app_name,
                        driver_reference = mapping.driver_reference,
                        error = %e,
                        "Failed to read DB driver"
                    );
                }
            }
        }

        Ok(resolved)
    }
}
