//! Pricing model resolution
//!
//! Decides how an application group is billed for a target year:
//! usage-based groups continue to the usage fan-out, matrix groups get the
//! yearly price of the matching configured year.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::MatrixYears;
use crate::db::models::{ApplicationGroup, MatrixPriceEntry, PricingModel};
use crate::db::ConfigStore;
use crate::error::PipelineError;

// ============================================================================
// Target year
// ============================================================================

/// The year passed on the command line, kept raw for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetYear {
    raw: String,
    parsed: Option<i32>,
}

impl TargetYear {
    /// Parse a year; invalid input is kept and reported later as a mismatch
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            parsed: raw.trim().parse().ok(),
        }
    }

    pub fn value(&self) -> Option<i32> {
        self.parsed
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TargetYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Why a group produced no reporting records
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NoPxqRecord,
    NoMatrixEntry,
    YearMismatch { target_year: String },
    NoMappings,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPxqRecord => write!(f, "no PXQ pricing model record"),
            SkipReason::NoMatrixEntry => write!(f, "no price matrix entry"),
            SkipReason::YearMismatch { target_year } => {
                write!(f, "year {:?} matches no configured matrix year", target_year)
            }
            SkipReason::NoMappings => write!(f, "no application mappings"),
        }
    }
}

/// Outcome of resolving a group's pricing model
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Fixed price for the target year, to be reported directly
    Matrix { yearly_price: f64 },
    /// Usage must be fetched from the group's mapped sources; the PXQ
    /// record's own yearly price follows the usage figures when set
    UsageBased { yearly_price: Option<f64> },
    /// Nothing to report for this group
    Skipped(SkipReason),
}

/// Pick the matrix price for `year`
pub fn select_matrix_price(entry: &MatrixPriceEntry, years: MatrixYears, year: i32) -> Option<f64> {
    if year == years.year1 {
        Some(entry.price_year1)
    } else if year == years.year2 {
        Some(entry.price_year2)
    } else {
        None
    }
}

/// Resolves pricing models against the configuration store
#[derive(Clone)]
pub struct PricingModelResolver {
    store: Arc<dyn ConfigStore>,
    years: MatrixYears,
}

impl PricingModelResolver {
    pub fn new(store: Arc<dyn ConfigStore>, years: MatrixYears) -> Self {
        Self { store, years }
    }

    /// Resolve the pricing of one group
    ///
    /// Missing records and unmatched years are reported as
    /// [`Resolution::Skipped`]; only store failures are errors.
    pub async fn resolve(
        &self,
        group: &ApplicationGroup,
        year: &TargetYear,
    ) -> Result<Resolution, PipelineError> {
        match group.pricing_model {
            PricingModel::UsageBased => self.resolve_usage_based(group).await,
            PricingModel::FixedMatrix => self.resolve_matrix(group, year).await,
        }
    }

    async fn resolve_usage_based(&self, group: &ApplicationGroup) -> Result<Resolution, PipelineError> {
        let Some(record) = self.store.pxq_record(&group.name).await? else {
            tracing::warn!(
                application_group = %group.name,
                "No PXQ pricing model record found"
            );
            return Ok(Resolution::Skipped(SkipReason::NoPxqRecord));
        };

        tracing::info!(
            application_group = %group.name,
            yearly_price = ?record.yearly_price,
            "PXQ pricing"
        );
        Ok(Resolution::UsageBased {
            yearly_price: record.yearly_price,
        })
    }

    async fn resolve_matrix(
        &self,
        group: &ApplicationGroup,
        year: &TargetYear,
    ) -> Result<Resolution, PipelineError> {
        let Some(entry) = self.store.matrix_entry(&group.name).await? else {
            tracing::warn!(application_group = %group.name, "No matrix data found");
            return Ok(Resolution::Skipped(SkipReason::NoMatrixEntry));
        };

        let price = year
            .value()
            .and_then(|y| select_matrix_price(&entry, self.years, y));

        match price {
            Some(yearly_price) => {
                tracing::info!(
                    application_group = %group.name,
                    target_year = %year,
                    yearly_price,
                    "Year matched"
                );
                Ok(Resolution::Matrix { yearly_price })
            }
            None => {
                tracing::warn!(
                    application_group = %group.name,
                    target_year = %year,
                    year1 = self.years.year1,
                    year2 = self.years.year2,
                    "Target year matches no configured matrix year"
                );
                Ok(Resolution::Skipped(SkipReason::YearMismatch {
                    target_year: year.raw().to_string(),
                }))
            }
        }
    }
}
